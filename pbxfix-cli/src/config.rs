//! Configuration file loading for pbxfix.
//!
//! Discovers and loads `pbxfix.toml` from the working directory.
//! Merges config file settings with CLI arguments (CLI takes precedence).

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use pbxfix_types::manifest::{FileDescriptor, GroupPlacement, Manifest, normalize_path};
use serde::Deserialize;
use tracing::debug;

/// The config file name to search for.
pub const CONFIG_FILE_NAME: &str = "pbxfix.toml";

/// Top-level configuration from pbxfix.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PbxfixConfig {
    /// The `.xcodeproj` bundle (or its `project.pbxproj`), relative to the config file.
    pub project: Option<Utf8PathBuf>,

    /// Native target whose sources phase receives new files.
    pub target: Option<String>,

    /// Backup settings.
    pub backups: BackupsConfig,

    /// Files to register.
    pub files: Vec<FileDescriptor>,

    /// Placement hints for groups that have to be created.
    pub groups: Vec<GroupPlacement>,
}

/// Backups section of the config.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackupsConfig {
    /// Whether to copy the project file aside before replacing it.
    pub enabled: bool,

    /// Suffix for backup files.
    pub suffix: String,
}

impl Default for BackupsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            suffix: ".pbxfix.bak".to_string(),
        }
    }
}

/// Discover the pbxfix.toml config file in `dir`.
pub fn discover_config(dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let config_path = dir.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        debug!("found config file at {}", config_path);
        Some(config_path)
    } else {
        debug!("no config file found at {}", config_path);
        None
    }
}

/// Load and parse a pbxfix.toml config file.
///
/// A relative `project` is resolved against the directory holding the file.
pub fn load_config(path: &Utf8Path) -> anyhow::Result<PbxfixConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config file {}", path))?;
    let mut config =
        parse_config(&contents).with_context(|| format!("parse config file {}", path))?;
    if let (Some(project), Some(dir)) = (config.project.as_mut(), path.parent())
        && project.is_relative()
        && !dir.as_str().is_empty()
    {
        *project = dir.join(&*project);
    }
    Ok(config)
}

/// Parse a config file from a string.
pub fn parse_config(contents: &str) -> anyhow::Result<PbxfixConfig> {
    let config: PbxfixConfig = toml::from_str(contents).context("invalid TOML")?;
    Ok(config)
}

/// Load config from `dir`, or return default if not found.
pub fn load_or_default(dir: &Utf8Path) -> anyhow::Result<PbxfixConfig> {
    match discover_config(dir) {
        Some(path) => load_config(&path),
        None => Ok(PbxfixConfig::default()),
    }
}

/// Merged configuration combining config file and CLI arguments.
#[derive(Debug, Clone, Default)]
pub struct MergedConfig {
    pub project: Option<Utf8PathBuf>,
    pub target: Option<String>,

    /// Config file entries, extended (or overridden per path) by CLI entries.
    pub manifest: Manifest,

    pub backups: BackupsConfig,
}

/// CLI values that take part in the merge.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub project: Option<Utf8PathBuf>,
    pub target: Option<String>,
    pub files: Vec<FileDescriptor>,
    pub groups: Vec<GroupPlacement>,
    pub no_backup: bool,
}

/// Builder for merging config file with CLI arguments.
pub struct ConfigMerger {
    config: PbxfixConfig,
}

impl ConfigMerger {
    pub fn new(config: PbxfixConfig) -> Self {
        Self { config }
    }

    /// CLI `project` and `target` replace the config values. CLI files and group placements
    /// extend the config lists; an entry for a path the config already lists replaces it.
    pub fn merge(self, cli: CliOverrides) -> MergedConfig {
        let PbxfixConfig {
            project,
            target,
            mut backups,
            mut files,
            mut groups,
        } = self.config;

        for file in cli.files {
            let key = normalize_path(&file.path);
            match files.iter_mut().find(|f| normalize_path(&f.path) == key) {
                Some(existing) => *existing = file,
                None => files.push(file),
            }
        }
        for placement in cli.groups {
            let key = normalize_path(&placement.path);
            match groups.iter_mut().find(|g| normalize_path(&g.path) == key) {
                Some(existing) => *existing = placement,
                None => groups.push(placement),
            }
        }

        if cli.no_backup {
            backups.enabled = false;
        }

        MergedConfig {
            project: cli.project.or(project),
            target: cli.target.or(target),
            manifest: Manifest { files, groups },
            backups,
        }
    }
}
