use serde::{Deserialize, Serialize};

/// A source file to register in the project.
///
/// `path` is relative to the project's source root (the directory holding the `.xcodeproj`
/// bundle). `group` is a `/`-separated path of group display names, e.g. `App/Views/Components`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub path: String,

    pub group: String,

    /// Display name; defaults to the file name of `path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Force (or suppress) membership in the sources build phase. Defaults to the file type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compile: Option<bool>,
}

impl FileDescriptor {
    pub fn new(path: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            group: group.into(),
            name: None,
            compile: None,
        }
    }

    /// File name component of `path`.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.file_name())
    }

    /// `path` with `./` prefixes, duplicate and trailing separators removed.
    pub fn normalized_path(&self) -> String {
        normalize_path(&self.path)
    }
}

/// Placement hint for a group that may have to be created.
///
/// When the group does not exist yet it is linked into its parent's children immediately after
/// the sibling named by `after`; without a hint it is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPlacement {
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

/// The batch of files to add in one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub files: Vec<FileDescriptor>,

    #[serde(default)]
    pub groups: Vec<GroupPlacement>,
}

impl Manifest {
    pub fn new(files: Vec<FileDescriptor>) -> Self {
        Self {
            files,
            groups: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Placement hint for a group path, matched after normalization.
    pub fn placement_for(&self, group_path: &str) -> Option<&GroupPlacement> {
        let wanted = normalize_path(group_path);
        self.groups.iter().find(|g| normalize_path(&g.path) == wanted)
    }
}

/// Normalize a `/`-separated path: drops empty and `.` components.
pub fn normalize_path(path: &str) -> String {
    path.split(['/', '\\'])
        .filter(|c| !c.is_empty() && *c != ".")
        .collect::<Vec<_>>()
        .join("/")
}
