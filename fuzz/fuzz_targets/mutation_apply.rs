#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pbxfix_domain::{MutationOptions, apply};
use pbxfix_edit::Document;
use pbxfix_types::manifest::{FileDescriptor, GroupPlacement, Manifest};

const PROJECT: &str = include_str!("../../tests/fixtures/TomatoTimer.xcodeproj/project.pbxproj");

#[derive(Debug, Arbitrary)]
struct Input {
    files: Vec<(String, String, Option<bool>)>,
    after: Option<(String, String)>,
    target: Option<String>,
}

fuzz_target!(|input: Input| {
    let Ok(doc) = Document::load(PROJECT) else { return };

    let files = input
        .files
        .into_iter()
        .take(16)
        .map(|(path, group, compile)| FileDescriptor {
            compile,
            ..FileDescriptor::new(path, group)
        })
        .collect();
    let groups = input
        .after
        .map(|(path, after)| GroupPlacement {
            path,
            after: Some(after),
        })
        .into_iter()
        .collect();
    let manifest = Manifest { files, groups };
    let options = MutationOptions {
        target: input.target,
    };

    // Whatever the manifest, a successful batch yields a document that loads cleanly
    // and holds no duplicate identifiers.
    if let Ok(mutation) = apply(&doc, &manifest, &options) {
        let out = Document::load(mutation.text.as_str()).expect("mutated document reloads");
        assert!(out.duplicate_ids().is_empty());
    }
});
