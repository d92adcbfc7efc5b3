#![no_main]

use libfuzzer_sys::fuzz_target;
use pbxfix_edit::Document;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else { return };

    // Loading never panics, and an untouched document serializes to its input.
    if let Ok(doc) = Document::load(s) {
        assert_eq!(doc.serialize(), s);
        let _ = pbxfix_domain::group_paths(&doc);
    }
});
