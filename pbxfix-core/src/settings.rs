//! Clap-free settings for the plan and apply pipelines.

use camino::Utf8PathBuf;
use pbxfix_types::manifest::Manifest;

/// Settings shared by `run_plan` and `run_apply`.
#[derive(Debug, Clone)]
pub struct AddSettings {
    /// Either the `.xcodeproj` bundle or the `project.pbxproj` inside it.
    pub project: Utf8PathBuf,
    pub manifest: Manifest,

    /// Native target whose sources phase receives new build files.
    pub target: Option<String>,

    // Apply behaviour
    pub dry_run: bool,

    // Backups
    pub backup_enabled: bool,
    pub backup_suffix: String,
}

impl Default for AddSettings {
    fn default() -> Self {
        Self {
            project: Utf8PathBuf::from("."),
            manifest: Manifest::default(),
            target: None,
            dry_run: true,
            backup_enabled: true,
            backup_suffix: ".pbxfix.bak".to_string(),
        }
    }
}
