//! Record synthesis: the literal text of every record a new file needs.
//!
//! Rendering is pure; only the identifier allocator is mutated.

use crate::filetype::{self, FileType};
use crate::ids::IdAllocator;
use pbxfix_edit::{ListEntry, quote};
use pbxfix_types::ObjectId;
use pbxfix_types::manifest::FileDescriptor;

const GROUP_TREE: &str = "<group>";
const SOURCE_ROOT: &str = "SOURCE_ROOT";

/// `PBXBuildFile`: puts a file reference into a build phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFileRecord {
    pub id: ObjectId,
    pub file_ref: ObjectId,
    pub name: String,
}

impl BuildFileRecord {
    pub fn render(&self, nl: &str) -> String {
        format!(
            "\t\t{id} /* {name} in Sources */ = {{isa = PBXBuildFile; fileRef = {file_ref} /* {name} */; }};{nl}",
            id = self.id,
            name = self.name,
            file_ref = self.file_ref,
        )
    }

    pub fn sources_entry(&self) -> ListEntry {
        ListEntry::new(self.id.clone(), format!("{} in Sources", self.name))
    }
}

/// `PBXFileReference`: location and type of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReferenceRecord {
    pub id: ObjectId,
    pub display_name: String,
    pub file_type: &'static str,
    pub path: String,
    pub source_tree: &'static str,
    /// Written only when Xcode would not derive the display name from `path`.
    pub name: Option<String>,
}

impl FileReferenceRecord {
    pub fn render(&self, nl: &str) -> String {
        let mut fields = format!(
            "isa = PBXFileReference; lastKnownFileType = {}; ",
            quote(self.file_type)
        );
        if let Some(name) = &self.name {
            fields.push_str(&format!("name = {}; ", quote(name)));
        }
        fields.push_str(&format!(
            "path = {}; sourceTree = {}; ",
            quote(&self.path),
            quote(self.source_tree)
        ));
        format!(
            "\t\t{} /* {} */ = {{{}}};{}",
            self.id, self.display_name, fields, nl
        )
    }

    pub fn group_entry(&self) -> ListEntry {
        ListEntry::new(self.id.clone(), self.display_name.clone())
    }
}

/// `PBXGroup` created for a missing path component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    pub id: ObjectId,
    pub name: String,
    pub children: Vec<ListEntry>,
}

impl GroupRecord {
    pub fn render(&self, nl: &str) -> String {
        let mut out = format!("\t\t{} /* {} */ = {{{nl}", self.id, self.name);
        out.push_str(&format!("\t\t\tisa = PBXGroup;{nl}"));
        out.push_str(&format!("\t\t\tchildren = ({nl}"));
        for child in &self.children {
            out.push_str(&format!("\t\t\t\t{child},{nl}"));
        }
        out.push_str(&format!("\t\t\t);{nl}"));
        out.push_str(&format!("\t\t\tpath = {};{nl}", quote(&self.name)));
        out.push_str(&format!("\t\t\tsourceTree = {};{nl}", quote(GROUP_TREE)));
        out.push_str(&format!("\t\t}};{nl}"));
        out
    }

    pub fn entry(&self) -> ListEntry {
        ListEntry::new(self.id.clone(), self.name.clone())
    }
}

/// Where a new file goes.
#[derive(Debug, Clone, Copy)]
pub struct Placement<'a> {
    /// Source-root-relative directory of the owning group, when it can be resolved.
    pub group_dir: Option<&'a str>,
    /// Seed component naming the target the build file is created for.
    pub target: &'a str,
}

/// Everything one descriptor contributes to the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedFile {
    pub build_file: Option<BuildFileRecord>,
    pub file_reference: FileReferenceRecord,
    pub group_entry: ListEntry,
    pub sources_entry: Option<ListEntry>,
}

/// Whether the descriptor joins the sources build phase: its `compile` flag, else the file type.
pub fn compiles(descriptor: &FileDescriptor) -> bool {
    descriptor
        .compile
        .unwrap_or_else(|| filetype::classify(descriptor.file_name()).compiles)
}

pub fn synthesize(
    descriptor: &FileDescriptor,
    placement: &Placement<'_>,
    ids: &mut IdAllocator,
) -> SynthesizedFile {
    let full_path = descriptor.normalized_path();
    let file_type: FileType = filetype::classify(descriptor.file_name());
    let compiled = compiles(descriptor);

    let (path, source_tree) = match placement.group_dir {
        Some("") => (full_path.clone(), GROUP_TREE),
        Some(dir) => match full_path.strip_prefix(dir).and_then(|r| r.strip_prefix('/')) {
            Some(rest) if !rest.is_empty() => (rest.to_string(), GROUP_TREE),
            _ => (full_path.clone(), SOURCE_ROOT),
        },
        None => (full_path.clone(), SOURCE_ROOT),
    };

    let display_name = descriptor.display_name().to_string();
    let path_file_name = path.rsplit('/').next().unwrap_or(&path);
    let name = (display_name != path_file_name).then(|| display_name.clone());

    let file_ref_id = ids.allocate(&format!("fileref|{full_path}"));
    let file_reference = FileReferenceRecord {
        id: file_ref_id.clone(),
        display_name: display_name.clone(),
        file_type: file_type.last_known,
        path,
        source_tree,
        name,
    };

    let build_file = compiled.then(|| BuildFileRecord {
        id: ids.allocate(&format!("buildfile|{}|{full_path}", placement.target)),
        file_ref: file_ref_id,
        name: display_name,
    });

    SynthesizedFile {
        group_entry: file_reference.group_entry(),
        sources_entry: build_file.as_ref().map(BuildFileRecord::sources_entry),
        build_file,
        file_reference,
    }
}

/// A new, initially empty group for path component `name` of `group_path`.
pub fn synthesize_group(name: &str, group_path: &str, ids: &mut IdAllocator) -> GroupRecord {
    GroupRecord {
        id: ids.allocate(&format!("group|{group_path}")),
        name: name.to_string(),
        children: Vec::new(),
    }
}
