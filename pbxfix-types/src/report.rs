use crate::id::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Machine-readable record of one `plan` or `apply` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddReport {
    pub schema: String,
    pub tool: ToolInfo,
    pub project: String,

    /// True when the project file was written.
    pub applied: bool,

    pub before_sha256: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_sha256: Option<String>,

    #[serde(default)]
    pub added: Vec<AddedFile>,

    #[serde(default)]
    pub skipped: Vec<SkippedFile>,

    #[serde(default)]
    pub groups_created: Vec<CreatedGroup>,

    pub summary: AddSummary,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

impl AddReport {
    pub fn new(
        tool: ToolInfo,
        project: impl Into<String>,
        before_sha256: impl Into<String>,
    ) -> Self {
        Self {
            schema: crate::schema::PBXFIX_REPORT_V1.to_string(),
            tool,
            project: project.into(),
            applied: false,
            before_sha256: before_sha256.into(),
            after_sha256: None,
            added: vec![],
            skipped: vec![],
            groups_created: vec![],
            summary: AddSummary::default(),
            generated_at: None,
        }
    }

    /// Recompute `summary` from the detail lists.
    pub fn refresh_summary(&mut self) {
        self.summary = AddSummary {
            files_added: self.added.len() as u64,
            files_compiled: self.added.iter().filter(|a| a.build_file.is_some()).count() as u64,
            files_skipped: self.skipped.len() as u64,
            groups_created: self.groups_created.len() as u64,
        };
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddSummary {
    pub files_added: u64,
    pub files_compiled: u64,
    pub files_skipped: u64,
    pub groups_created: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddedFile {
    pub path: String,
    pub name: String,
    pub group: String,
    pub file_ref: ObjectId,

    /// Present when the file joined the sources build phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_file: Option<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: String,
    pub group: String,
    pub reason: SkipReason,

    /// Existing file reference, when the skip was caused by one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing: Option<ObjectId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The project already references a file at this path.
    AlreadyReferenced,
    /// The same path appeared earlier in the manifest.
    DuplicateInManifest,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::AlreadyReferenced => "already referenced",
            SkipReason::DuplicateInManifest => "duplicate in manifest",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedGroup {
    pub path: String,
    pub id: ObjectId,
    pub parent: ObjectId,
}
