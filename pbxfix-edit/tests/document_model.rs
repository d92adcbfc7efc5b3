//! Document model behaviour: loading, lookup, anchored insertion and serialization.

use pbxfix_edit::{Document, DocumentError, ListEntry, end_marker};
use pbxfix_types::ObjectId;
use pretty_assertions::assert_eq;

const PROJECT: &str = r#"// !$*UTF8*$!
{
	archiveVersion = 1;
	classes = {
	};
	objectVersion = 56;
	objects = {

/* Begin PBXBuildFile section */
		B0000000000000000000001 /* App.swift in Sources */ = {isa = PBXBuildFile; fileRef = F0000000000000000000001 /* App.swift */; };
/* End PBXBuildFile section */

/* Begin PBXFileReference section */
		F0000000000000000000001 /* App.swift */ = {isa = PBXFileReference; lastKnownFileType = sourcecode.swift; path = App.swift; sourceTree = "<group>"; };
		F0000000000000000000002 /* Info.plist */ = {isa = PBXFileReference; lastKnownFileType = text.plist.xml; path = "Info.plist"; sourceTree = "<group>"; };
/* End PBXFileReference section */

/* Begin PBXGroup section */
		G0000000000000000000001 = {
			isa = PBXGroup;
			children = (
				F0000000000000000000001 /* App.swift */,
				F0000000000000000000002 /* Info.plist */,
			);
			sourceTree = "<group>";
		};
/* End PBXGroup section */
	};
	rootObject = P0000000000000000000001 /* Project object */;
}
"#;

fn id(raw: &str) -> ObjectId {
    ObjectId::parse(raw).expect("valid id")
}

fn malformed_message(text: &str) -> String {
    match Document::load(text) {
        Err(DocumentError::MalformedDocument { message }) => message,
        other => panic!("expected MalformedDocument, got {other:?}"),
    }
}

#[test]
fn serialize_without_edits_is_identity() {
    let doc = Document::load(PROJECT).expect("load");
    assert_eq!(doc.serialize(), PROJECT);
    assert_eq!(doc.pending_edits(), 0);
}

#[test]
fn sections_are_indexed_in_order() {
    let doc = Document::load(PROJECT).expect("load");
    let names: Vec<&str> = doc.sections().iter().map(|s| s.name()).collect();
    assert_eq!(names, vec!["PBXBuildFile", "PBXFileReference", "PBXGroup"]);

    let refs = doc.section_records("PBXFileReference").expect("records");
    assert_eq!(refs.len(), 2);
    assert!(refs[1].starts_with("F0000000000000000000002 /* Info.plist */ = {"));
    assert!(refs[1].ends_with("};"));
}

#[test]
fn records_expose_typed_fields() {
    let doc = Document::load(PROJECT).expect("load");
    let plist = doc.record("F0000000000000000000002").expect("record");
    assert_eq!(plist.isa(), Some("PBXFileReference"));
    assert_eq!(plist.scalar("path"), Some("Info.plist"));

    let build = doc.record("B0000000000000000000001").expect("build file");
    assert_eq!(build.scalar("fileRef"), Some("F0000000000000000000001"));
    assert_eq!(doc.records().count(), 4);
}

#[test]
fn missing_section_is_reported_by_name() {
    let doc = Document::load(PROJECT).expect("load");
    let err = doc.section("PBXSourcesBuildPhase").expect_err("missing");
    assert_eq!(
        err,
        DocumentError::SectionNotFound {
            name: "PBXSourcesBuildPhase".to_string()
        }
    );
}

#[test]
fn load_rejects_text_without_sections() {
    let message = malformed_message("// !$*UTF8*$!\n{\n\tobjects = {\n\t};\n}\n");
    assert!(message.contains("no section markers"));
}

#[test]
fn load_rejects_unclosed_section() {
    let text = PROJECT.replace("/* End PBXGroup section */\n", "");
    let message = malformed_message(&text);
    assert!(message.contains("PBXGroup"));
    assert!(message.contains("never closed"));
}

#[test]
fn load_rejects_mismatched_end_marker() {
    let text = PROJECT.replace("/* End PBXBuildFile section */", "/* End PBXGroup section */");
    let message = malformed_message(&text);
    assert!(message.contains("closed by an end marker for PBXGroup"));
}

#[test]
fn load_rejects_untokenisable_record_with_line_number() {
    let text = PROJECT.replace(
        "isa = PBXBuildFile; fileRef",
        "isa = PBXBuildFile fileRef",
    );
    let message = malformed_message(&text);
    assert!(message.contains("section PBXBuildFile, line 10"), "{message}");
}

#[test]
fn load_rejects_non_identifier_keys() {
    let text = PROJECT.replace(
        "\t\tG0000000000000000000001 = {",
        "\t\t\"not an id\" = {",
    );
    let message = malformed_message(&text);
    assert!(message.contains("not an identifier"));
}

#[test]
fn duplicate_definitions_are_collected() {
    let dup = "\t\tF0000000000000000000001 /* App.swift */ = {isa = PBXFileReference; path = Other.swift; sourceTree = \"<group>\"; };\n";
    let text = PROJECT.replace(
        "/* End PBXFileReference section */",
        &format!("{dup}/* End PBXFileReference section */"),
    );
    let doc = Document::load(text).expect("load");
    assert_eq!(doc.duplicate_ids(), &[id("F0000000000000000000001")]);
    // Lookups resolve to the first definition.
    let first = doc.record("F0000000000000000000001").expect("record");
    assert_eq!(first.scalar("path"), Some("App.swift"));
}

#[test]
fn splice_before_inserts_at_the_unique_anchor() {
    let mut doc = Document::load(PROJECT).expect("load");
    let anchor = end_marker("PBXFileReference");
    doc.splice_before(&anchor, "\t\tNEW = {isa = PBXFileReference; };\n")
        .expect("splice");

    let out = doc.serialize();
    let at = PROJECT.find(&anchor).expect("anchor");
    assert_eq!(&out[..at], &PROJECT[..at]);
    assert!(
        out[at..].starts_with("\t\tNEW = {isa = PBXFileReference; };\n/* End PBXFileReference")
    );
    assert_eq!(out.len(), PROJECT.len() + "\t\tNEW = {isa = PBXFileReference; };\n".len());
}

#[test]
fn splice_before_counts_anchor_matches() {
    let mut doc = Document::load(PROJECT).expect("load");

    let err = doc.splice_before("/* End PBXVariantGroup section */", "x").expect_err("absent");
    assert!(matches!(err, DocumentError::AnchorNotFound { matches: 0, .. }));

    let err = doc.splice_before("sourceTree", "x").expect_err("ambiguous");
    assert!(matches!(err, DocumentError::AnchorNotFound { matches: 3, .. }));

    let err = doc.splice_before("", "x").expect_err("empty");
    assert!(matches!(err, DocumentError::AnchorNotFound { matches: 0, .. }));

    assert_eq!(doc.pending_edits(), 0);
    assert_eq!(doc.serialize(), PROJECT);
}

#[test]
fn insertions_at_one_offset_keep_queue_order() {
    let mut doc = Document::load(PROJECT).expect("load");
    let anchor = end_marker("PBXGroup");
    doc.splice_before(&anchor, "first\n").expect("first");
    doc.splice_before(&anchor, "second\n").expect("second");
    assert!(doc.serialize().contains("first\nsecond\n/* End PBXGroup section */"));
}

#[test]
fn list_edits_and_record_splices_compose() {
    let mut doc = Document::load(PROJECT).expect("load");
    doc.splice_before(
        &end_marker("PBXFileReference"),
        "\t\tF0000000000000000000003 /* New.swift */ = {isa = PBXFileReference; path = New.swift; sourceTree = \"<group>\"; };\n",
    )
    .expect("record");
    doc.insert_after_in_list(
        "G0000000000000000000001",
        "children",
        "F0000000000000000000001",
        &[ListEntry::new(id("F0000000000000000000003"), "New.swift")],
    )
    .expect("child");

    let reloaded = Document::load(doc.serialize()).expect("reload");
    let group = reloaded.record("G0000000000000000000001").expect("group");
    assert_eq!(
        group.list("children"),
        Some(vec![
            "F0000000000000000000001",
            "F0000000000000000000003",
            "F0000000000000000000002",
        ])
    );
    assert_eq!(
        reloaded.section_records("PBXBuildFile").expect("build files"),
        Document::load(PROJECT)
            .expect("load")
            .section_records("PBXBuildFile")
            .expect("build files")
    );
}

#[test]
fn list_edits_on_unknown_records_fail() {
    let mut doc = Document::load(PROJECT).expect("load");
    let err = doc
        .append_to_list("NOPE", "children", &[ListEntry::new(id("X1"), "x")])
        .expect_err("unknown record");
    assert!(matches!(err, DocumentError::RecordNotFound { .. }));

    let err = doc
        .append_to_list("F0000000000000000000001", "path", &[ListEntry::new(id("X1"), "x")])
        .expect_err("not a list");
    assert!(matches!(err, DocumentError::MalformedDocument { .. }));
}

#[test]
fn identifiers_in_use_cover_records_and_references() {
    let doc = Document::load(PROJECT).expect("load");
    let used = doc.identifiers_in_use();
    assert!(used.contains("B0000000000000000000001"));
    assert!(used.contains("G0000000000000000000001"));
    // Only referenced, never defined in an indexed section.
    assert!(!used.contains("P0000000000000000000001"));
}

const UNTERMINATED: &str = "{
/* Begin PBXGroup section */
\t\tG1 /* App */ = {
\t\t\tisa = PBXGroup;
\t\t\tchildren = (
\t\t\t\tX1 /* A.swift */
\t\t\t);
\t\t\ttags = (T1, T2);
\t\t};
/* End PBXGroup section */
}
";

#[test]
fn append_terminates_last_member_without_comma() {
    let mut doc = Document::load(UNTERMINATED).expect("load");
    doc.append_to_list("G1", "children", &[ListEntry::new(id("N1"), "B.swift")])
        .expect("append");
    doc.append_to_list("G1", "children", &[ListEntry::new(id("N2"), "C.swift")])
        .expect("append again");

    let out = doc.serialize();
    assert!(out.contains(
        "\t\t\t\tX1 /* A.swift */,\n\t\t\t\tN1 /* B.swift */,\n\t\t\t\tN2 /* C.swift */,\n\t\t\t);"
    ));
    let reloaded = Document::load(out).expect("reload");
    let group = reloaded.record("G1").expect("group");
    assert_eq!(group.list("children"), Some(vec!["X1", "N1", "N2"]));
}

#[test]
fn append_to_inline_list_without_trailing_comma() {
    let mut doc = Document::load(UNTERMINATED).expect("load");
    doc.append_to_list("G1", "tags", &[ListEntry::new(id("T3"), "t")])
        .expect("append");
    doc.append_to_list("G1", "tags", &[ListEntry::new(id("T4"), "t")])
        .expect("append again");

    let out = doc.serialize();
    assert!(out.contains("tags = (T1, T2, T3 /* t */, T4 /* t */,);"));
    let reloaded = Document::load(out).expect("reload");
    assert_eq!(
        reloaded.record("G1").and_then(|g| g.list("tags")),
        Some(vec!["T1", "T2", "T3", "T4"])
    );
}

#[test]
fn insert_after_last_unterminated_member() {
    let mut doc = Document::load(UNTERMINATED).expect("load");
    doc.insert_after_in_list("G1", "children", "X1", &[ListEntry::new(id("N1"), "B.swift")])
        .expect("insert");

    let reloaded = Document::load(doc.serialize()).expect("reload");
    assert_eq!(
        reloaded.record("G1").and_then(|g| g.list("children")),
        Some(vec!["X1", "N1"])
    );
}
