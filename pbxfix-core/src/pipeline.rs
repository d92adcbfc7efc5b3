//! Core plan and apply pipelines, extracted from the CLI.
//!
//! These entry points are I/O-agnostic: all filesystem access goes through the port traits.

use crate::ports::{ProjectSource, WritePort};
use crate::settings::AddSettings;
use anyhow::{Context, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use pbxfix_domain::{Mutation, MutationOptions};
use pbxfix_edit::{Document, EditError, encoding, render_patch, sha256_hex};
use pbxfix_types::manifest::Manifest;
use pbxfix_types::report::{AddReport, ToolInfo};
use tracing::{debug, info};

/// File name of the project document inside an `.xcodeproj` bundle.
pub const PROJECT_FILE: &str = "project.pbxproj";

/// Outcome of `run_plan` and `run_apply`.
#[derive(Debug, Clone)]
pub struct AddOutcome {
    /// Resolved path of the `project.pbxproj`.
    pub project: Utf8PathBuf,
    pub report: AddReport,
    pub patch: String,

    /// Where the previous contents were copied, when a backup was taken.
    pub backup: Option<Utf8PathBuf>,
}

impl AddOutcome {
    /// True when the batch adds at least one file.
    pub fn changed(&self) -> bool {
        !self.report.added.is_empty()
    }
}

/// Accept either an `.xcodeproj` bundle or the `project.pbxproj` inside it.
pub fn resolve_project_path(path: &Utf8Path) -> Utf8PathBuf {
    if path.extension() == Some("xcodeproj") {
        path.join(PROJECT_FILE)
    } else {
        path.to_path_buf()
    }
}

/// Compute the mutation and its patch. Nothing is written.
pub fn run_plan(
    settings: &AddSettings,
    source: &dyn ProjectSource,
    tool: ToolInfo,
) -> Result<AddOutcome, EditError> {
    let prepared = prepare(settings, source, tool)?;
    Ok(prepared.into_outcome(None))
}

/// Compute the mutation and persist it.
///
/// With `dry_run` set this behaves like `run_plan`. Otherwise the project is re-read just before
/// the write; if its bytes changed since the mutation was computed the run fails with
/// `PreconditionMismatch` and nothing is written. The write itself is atomic, so any failure
/// leaves the original file as it was.
///
/// Concurrent runs against the same project are not supported and no lock is taken. Serializing
/// them is the caller's job. The re-read only narrows the window: a write landing between the
/// check and the rename is silently replaced.
pub fn run_apply(
    settings: &AddSettings,
    source: &dyn ProjectSource,
    writer: &dyn WritePort,
    tool: ToolInfo,
) -> Result<AddOutcome, EditError> {
    let mut prepared = prepare(settings, source, tool)?;
    if settings.dry_run {
        debug!("dry run; not writing {}", prepared.path);
        return Ok(prepared.into_outcome(None));
    }
    if prepared.mutation.is_noop() {
        info!(project = %prepared.path, "nothing to add");
        return Ok(prepared.into_outcome(None));
    }

    let current = source
        .read_project(&prepared.path)
        .with_context(|| format!("re-read {}", prepared.path))?;
    let current_sha = sha256_hex(&current);
    if current_sha != prepared.report.before_sha256 {
        return Err(EditError::PreconditionMismatch {
            message: format!(
                "{} changed while pbxfix was running (expected sha256 {}, found {})",
                prepared.path, prepared.report.before_sha256, current_sha
            ),
        });
    }

    let backup = if settings.backup_enabled {
        Some(writer.write_backup(&prepared.path, &settings.backup_suffix)?)
    } else {
        None
    };

    writer
        .write_atomic(&prepared.path, &prepared.after)
        .with_context(|| format!("write {}", prepared.path))?;
    prepared.report.applied = true;

    info!(
        project = %prepared.path,
        added = prepared.report.summary.files_added,
        groups = prepared.report.summary.groups_created,
        "project updated"
    );
    Ok(prepared.into_outcome(backup))
}

/// Every group path of the project, main group children first.
pub fn list_groups(
    project: &Utf8Path,
    source: &dyn ProjectSource,
) -> Result<Vec<String>, EditError> {
    let path = resolve_project_path(project);
    let bytes = source
        .read_project(&path)
        .with_context(|| format!("read {}", path))?;
    let (text, _) = encoding::decode(&bytes);
    let doc = Document::load(text)?;
    Ok(pbxfix_domain::group_paths(&doc)?)
}

/// Write the JSON report for one run.
pub fn write_report(
    report: &AddReport,
    path: &Utf8Path,
    writer: &dyn WritePort,
) -> anyhow::Result<()> {
    let mut json = serde_json::to_string_pretty(report).context("serialize report")?;
    json.push('\n');
    writer.write_file(path, json.as_bytes())
}

struct Prepared {
    path: Utf8PathBuf,
    mutation: Mutation,
    /// `mutation.text` encoded the way the original was.
    after: Vec<u8>,
    report: AddReport,
    patch: String,
}

impl Prepared {
    fn into_outcome(self, backup: Option<Utf8PathBuf>) -> AddOutcome {
        AddOutcome {
            project: self.path,
            report: self.report,
            patch: self.patch,
            backup,
        }
    }
}

fn prepare(
    settings: &AddSettings,
    source: &dyn ProjectSource,
    tool: ToolInfo,
) -> Result<Prepared, EditError> {
    validate_manifest(&settings.manifest)?;

    let path = resolve_project_path(&settings.project);
    let raw = source
        .read_project(&path)
        .with_context(|| format!("read {}", path))?;
    let (before, text_encoding) = encoding::decode(&raw);
    debug!(project = %path, bytes = raw.len(), encoding = ?text_encoding, "loaded project");

    let doc = Document::load(before.as_str())?;
    let options = MutationOptions {
        target: settings.target.clone(),
    };
    let mutation = pbxfix_domain::apply(&doc, &settings.manifest, &options)?;
    let after = encoding::encode(&mutation.text, text_encoding);

    let mut report = AddReport::new(tool, path.as_str(), sha256_hex(&raw));
    report.after_sha256 = Some(sha256_hex(&after));
    report.added = mutation.outcome.added.clone();
    report.skipped = mutation.outcome.skipped.clone();
    report.groups_created = mutation.outcome.groups_created.clone();
    report.generated_at = Some(Utc::now());
    report.refresh_summary();

    let patch = render_patch(path.as_str(), &before, &mutation.text);

    Ok(Prepared {
        path,
        mutation,
        after,
        report,
        patch,
    })
}

fn validate_manifest(manifest: &Manifest) -> anyhow::Result<()> {
    for (index, file) in manifest.files.iter().enumerate() {
        if file.path.trim().is_empty() {
            return Err(anyhow!("manifest entry {} has an empty path", index + 1));
        }
        if file.path.ends_with('/') {
            return Err(anyhow!("manifest entry {} is a directory: {}", index + 1, file.path));
        }
        if file.group.trim().is_empty() {
            return Err(anyhow!("{} has no target group", file.path));
        }
        let fields = [Some(&file.path), Some(&file.group), file.name.as_ref()];
        reject_comment_close(&file.path, fields.into_iter().flatten())?;
    }
    for placement in &manifest.groups {
        if placement.path.trim().is_empty() {
            return Err(anyhow!("group placement with an empty path"));
        }
        let fields = [Some(&placement.path), placement.after.as_ref()];
        reject_comment_close(&placement.path, fields.into_iter().flatten())?;
    }
    Ok(())
}

/// Names end up inside `/* .. */` comments, which cannot be escaped.
fn reject_comment_close<'a>(
    entry: &str,
    values: impl IntoIterator<Item = &'a String>,
) -> anyhow::Result<()> {
    match values.into_iter().find(|v| v.contains("*/")) {
        Some(value) => Err(anyhow!("{entry}: {value:?} contains \"*/\"")),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryProject;
    use pbxfix_types::manifest::{FileDescriptor, GroupPlacement};
    use pretty_assertions::assert_eq;

    const PROJECT: &str = "// !$*UTF8*$!
{
\tobjects = {

/* Begin PBXBuildFile section */
/* End PBXBuildFile section */

/* Begin PBXFileReference section */
\t\tA10000000000000000000001 /* Old.swift */ = {isa = PBXFileReference; lastKnownFileType = sourcecode.swift; path = Old.swift; sourceTree = \"<group>\"; };
/* End PBXFileReference section */

/* Begin PBXGroup section */
\t\tA20000000000000000000001 = {
\t\t\tisa = PBXGroup;
\t\t\tchildren = (
\t\t\t\tA20000000000000000000002 /* App */,
\t\t\t);
\t\t\tsourceTree = \"<group>\";
\t\t};
\t\tA20000000000000000000002 /* App */ = {
\t\t\tisa = PBXGroup;
\t\t\tchildren = (
\t\t\t\tA10000000000000000000001 /* Old.swift */,
\t\t\t);
\t\t\tpath = App;
\t\t\tsourceTree = \"<group>\";
\t\t};
/* End PBXGroup section */

/* Begin PBXSourcesBuildPhase section */
\t\tA30000000000000000000001 /* Sources */ = {
\t\t\tisa = PBXSourcesBuildPhase;
\t\t\tfiles = (
\t\t\t);
\t\t};
/* End PBXSourcesBuildPhase section */
\t};
}
";

    fn tool() -> ToolInfo {
        ToolInfo {
            name: "pbxfix".into(),
            version: Some("0.0.0-test".into()),
        }
    }

    fn settings(files: Vec<FileDescriptor>) -> AddSettings {
        AddSettings {
            project: Utf8PathBuf::from("App.xcodeproj"),
            manifest: Manifest::new(files),
            dry_run: false,
            ..AddSettings::default()
        }
    }

    fn store() -> InMemoryProject {
        InMemoryProject::new("App.xcodeproj/project.pbxproj", PROJECT)
    }

    #[test]
    fn resolves_bundle_and_file_paths() {
        assert_eq!(
            resolve_project_path(Utf8Path::new("App.xcodeproj")).as_str(),
            "App.xcodeproj/project.pbxproj"
        );
        assert_eq!(
            resolve_project_path(Utf8Path::new("App.xcodeproj/project.pbxproj")).as_str(),
            "App.xcodeproj/project.pbxproj"
        );
    }

    #[test]
    fn plan_does_not_write() {
        let store = store();
        let outcome = run_plan(
            &settings(vec![FileDescriptor::new("App/New.swift", "App")]),
            &store,
            tool(),
        )
        .unwrap();

        assert!(outcome.changed());
        assert!(!outcome.report.applied);
        assert!(outcome.patch.contains("+\t\t\t\t"));
        assert_eq!(
            store.get(Utf8Path::new("App.xcodeproj/project.pbxproj")).as_deref(),
            Some(PROJECT)
        );
    }

    #[test]
    fn apply_writes_backup_and_project() {
        let store = store();
        let outcome = run_apply(
            &settings(vec![FileDescriptor::new("App/New.swift", "App")]),
            &store,
            &store,
            tool(),
        )
        .unwrap();

        assert!(outcome.report.applied);
        assert_eq!(outcome.report.summary.files_added, 1);
        assert_eq!(outcome.report.summary.files_compiled, 1);

        let backup = outcome.backup.expect("backup");
        assert_eq!(store.get(&backup).as_deref(), Some(PROJECT));

        let written = store.get(&outcome.project).unwrap();
        assert_eq!(
            Some(sha256_hex(written.as_bytes())),
            outcome.report.after_sha256
        );
        assert!(written.contains("New.swift in Sources"));
    }

    #[test]
    fn dry_run_apply_leaves_project_alone() {
        let store = store();
        let mut s = settings(vec![FileDescriptor::new("App/New.swift", "App")]);
        s.dry_run = true;

        let outcome = run_apply(&s, &store, &store, tool()).unwrap();

        assert!(!outcome.report.applied);
        assert!(outcome.backup.is_none());
        assert_eq!(store.get(&outcome.project).as_deref(), Some(PROJECT));
    }

    #[test]
    fn rerun_is_a_noop_without_backup() {
        let store = store();
        let s = settings(vec![FileDescriptor::new("App/New.swift", "App")]);
        run_apply(&s, &store, &store, tool()).unwrap();
        let after_first = store.get(Utf8Path::new("App.xcodeproj/project.pbxproj"));

        let second = run_apply(&s, &store, &store, tool()).unwrap();

        assert!(!second.changed());
        assert!(!second.report.applied);
        assert!(second.backup.is_none());
        assert!(second.patch.is_empty());
        assert_eq!(second.report.summary.files_skipped, 1);
        assert_eq!(store.get(&second.project), after_first);
    }

    #[test]
    fn structural_failure_exits_2_and_writes_nothing() {
        let store = store();
        let err = run_apply(
            &settings(vec![FileDescriptor::new("Lib/New.swift", "Lib")]),
            &store,
            &store,
            tool(),
        )
        .unwrap_err();

        assert_eq!(err.exit_code(), 2);
        assert_eq!(
            store.get(Utf8Path::new("App.xcodeproj/project.pbxproj")).as_deref(),
            Some(PROJECT)
        );
    }

    #[test]
    fn empty_path_is_a_runtime_error() {
        let store = store();
        let err = run_plan(&settings(vec![FileDescriptor::new(" ", "App")]), &store, tool())
            .unwrap_err();

        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("empty path"));
    }

    #[test]
    fn comment_terminator_in_names_is_rejected() {
        let store = store();
        let mut renamed = FileDescriptor::new("App/New.swift", "App");
        renamed.name = Some("Evil */ name".into());

        let err = run_apply(&settings(vec![renamed]), &store, &store, tool()).unwrap_err();

        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("\"*/\""));
        assert_eq!(
            store.get(Utf8Path::new("App.xcodeproj/project.pbxproj")).as_deref(),
            Some(PROJECT)
        );

        let mut s = settings(vec![FileDescriptor::new("App/a*/b.swift", "App")]);
        assert!(run_plan(&s, &store, tool()).is_err());
        s.manifest.files.clear();
        s.manifest.groups.push(GroupPlacement {
            path: "App/Nav".into(),
            after: Some("Old */".into()),
        });
        assert!(run_plan(&s, &store, tool()).is_err());
    }

    #[test]
    fn latin1_bytes_outside_the_edit_are_preserved() {
        let original = PROJECT.replace("/* App */ = {", "/* App caf\u{e9} */ = {");
        let bytes: Vec<u8> = original
            .chars()
            .map(|c| u8::try_from(u32::from(c)).unwrap())
            .collect();
        assert!(std::str::from_utf8(&bytes).is_err());
        let store = InMemoryProject::new("App.xcodeproj/project.pbxproj", bytes.clone());

        let outcome = run_apply(
            &settings(vec![FileDescriptor::new("App/New.swift", "App")]),
            &store,
            &store,
            tool(),
        )
        .unwrap();

        assert_eq!(outcome.report.before_sha256, sha256_hex(&bytes));
        let written = store.get_bytes(&outcome.project).unwrap();
        assert_eq!(outcome.report.after_sha256, Some(sha256_hex(&written)));
        let needle = b"/* App caf\xe9 */ = {";
        assert!(written.windows(needle.len()).any(|w| w == needle));
        assert!(written.len() > bytes.len());

        let backup = store.get_bytes(&outcome.backup.unwrap()).unwrap();
        assert_eq!(backup, bytes);

        let text = store.get(&outcome.project).unwrap();
        assert!(text.contains("New.swift in Sources"));
    }

    #[test]
    fn missing_project_is_a_runtime_error() {
        let store = InMemoryProject::default();
        let err = run_plan(&settings(vec![]), &store, tool()).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn lists_groups() {
        let store = store();
        let groups = list_groups(Utf8Path::new("App.xcodeproj"), &store).unwrap();
        assert_eq!(groups, vec!["App".to_string()]);
    }

    #[test]
    fn report_serializes_with_schema() {
        let store = store();
        let outcome = run_plan(
            &settings(vec![FileDescriptor::new("App/New.swift", "App")]),
            &store,
            tool(),
        )
        .unwrap();

        write_report(&outcome.report, Utf8Path::new("report.json"), &store).unwrap();
        let json = store.get(Utf8Path::new("report.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["schema"], "pbxfix.report.v1");
        assert_eq!(value["added"][0]["path"], "App/New.swift");
        assert_eq!(value["summary"]["files_added"], 1);
    }
}
