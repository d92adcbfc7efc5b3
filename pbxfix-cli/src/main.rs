mod config;
mod render;

use anyhow::{Context, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use config::{CliOverrides, ConfigMerger, MergedConfig};
use fs_err as fs;
use pbxfix_core::adapters::{FsProjectSource, FsWritePort};
use pbxfix_core::pipeline::write_report;
use pbxfix_core::settings::AddSettings;
use pbxfix_core::{AddOutcome, list_groups, run_apply, run_plan};
use pbxfix_edit::EditError;
use pbxfix_types::manifest::{FileDescriptor, GroupPlacement};
use pbxfix_types::report::ToolInfo;
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "pbxfix",
    version,
    about = "Registers new source files in an Xcode project.pbxproj without corrupting it."
)]
struct Cli {
    /// Config file (default: ./pbxfix.toml when present).
    #[arg(long, global = true)]
    config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the patch that adding the files would produce. Writes nothing.
    Plan(PlanArgs),
    /// Add the files and write the project atomically.
    Apply(ApplyArgs),
    /// List every group path in the project.
    Groups(GroupsArgs),
}

#[derive(Debug, Args)]
struct ProjectArgs {
    /// The .xcodeproj bundle or its project.pbxproj (default: from config, else the only bundle
    /// in the current directory).
    #[arg(long)]
    project: Option<Utf8PathBuf>,
}

#[derive(Debug, Args)]
struct ManifestArgs {
    #[command(flatten)]
    project: ProjectArgs,

    /// Native target whose sources phase receives the files (default: the first target).
    #[arg(long)]
    target: Option<String>,

    /// File to add, as PATH=GROUP. Repeatable; extends the config's [[files]].
    #[arg(long = "file", value_name = "PATH=GROUP", value_parser = parse_file_arg)]
    files: Vec<FileDescriptor>,

    /// Place a new group after an existing sibling, as GROUP=SIBLING. Repeatable.
    #[arg(long = "after", value_name = "GROUP=SIBLING", value_parser = parse_placement_arg)]
    placements: Vec<GroupPlacement>,

    /// Write a JSON report to this path.
    #[arg(long)]
    report: Option<Utf8PathBuf>,
}

#[derive(Debug, Args)]
struct PlanArgs {
    #[command(flatten)]
    manifest: ManifestArgs,
}

#[derive(Debug, Args)]
struct ApplyArgs {
    #[command(flatten)]
    manifest: ManifestArgs,

    /// Do not copy the project file aside before replacing it.
    #[arg(long, default_value_t = false)]
    no_backup: bool,

    /// Compute everything but leave the project file alone.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct GroupsArgs {
    #[command(flatten)]
    project: ProjectArgs,

    /// Output format (text, json).
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    match real_main() {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

fn real_main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();
    match cli.cmd {
        Command::Plan(args) => cmd_plan(args, config),
        Command::Apply(args) => cmd_apply(args, config),
        Command::Groups(args) => cmd_groups(args, config),
    }
}

/// Structural failures exit 2, everything else 1.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<EditError>() {
        Some(edit) => edit.exit_code(),
        None => 1,
    }
}

fn tool() -> ToolInfo {
    ToolInfo {
        name: "pbxfix".to_string(),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    }
}

fn parse_file_arg(raw: &str) -> Result<FileDescriptor, String> {
    match raw.split_once('=') {
        Some((path, group)) if !path.trim().is_empty() && !group.trim().is_empty() => {
            Ok(FileDescriptor::new(path.trim(), group.trim()))
        }
        _ => Err(format!("expected PATH=GROUP, got {raw:?}")),
    }
}

fn parse_placement_arg(raw: &str) -> Result<GroupPlacement, String> {
    match raw.split_once('=') {
        Some((path, after)) if !path.trim().is_empty() && !after.trim().is_empty() => {
            Ok(GroupPlacement {
                path: path.trim().to_string(),
                after: Some(after.trim().to_string()),
            })
        }
        _ => Err(format!("expected GROUP=SIBLING, got {raw:?}")),
    }
}

fn load_merged(config_path: Option<&Utf8Path>, cli: CliOverrides) -> anyhow::Result<MergedConfig> {
    let file_config = match config_path {
        Some(path) => config::load_config(path)?,
        None => config::load_or_default(Utf8Path::new(".")).context("load pbxfix.toml config")?,
    };
    let merged = ConfigMerger::new(file_config).merge(cli);
    debug!(
        "merged config: project={:?}, target={:?}, files={}, groups={}",
        merged.project,
        merged.target,
        merged.manifest.files.len(),
        merged.manifest.groups.len()
    );
    Ok(merged)
}

/// The project named on the command line or in the config, else the only `.xcodeproj` bundle
/// in the current directory.
fn project_path(explicit: Option<Utf8PathBuf>) -> anyhow::Result<Utf8PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }

    let mut bundles = Vec::new();
    for entry in fs::read_dir(".")? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("xcodeproj") {
            let path = Utf8PathBuf::from_path_buf(path)
                .map_err(|p| anyhow!("non UTF-8 path {}", p.display()))?;
            bundles.push(path);
        }
    }
    bundles.sort();
    match bundles.as_slice() {
        [only] => Ok(only.clone()),
        [] => Err(anyhow!(
            "no .xcodeproj in the current directory; pass --project"
        )),
        many => Err(anyhow!(
            "{} .xcodeproj bundles in the current directory; pass --project",
            many.len()
        )),
    }
}

fn settings_from(
    args: &mut ManifestArgs,
    config_path: Option<&Utf8Path>,
    no_backup: bool,
) -> anyhow::Result<AddSettings> {
    let merged = load_merged(
        config_path,
        CliOverrides {
            project: args.project.project.take(),
            target: args.target.take(),
            files: std::mem::take(&mut args.files),
            groups: std::mem::take(&mut args.placements),
            no_backup,
        },
    )?;

    Ok(AddSettings {
        project: project_path(merged.project)?,
        manifest: merged.manifest,
        target: merged.target,
        dry_run: true,
        backup_enabled: merged.backups.enabled,
        backup_suffix: merged.backups.suffix,
    })
}

fn finish(outcome: &AddOutcome, report: Option<&Utf8Path>) -> anyhow::Result<()> {
    print!("{}", render::confirmation(&outcome.report));
    if let Some(path) = report {
        write_report(&outcome.report, path, &FsWritePort)
            .with_context(|| format!("write report {}", path))?;
        info!("wrote report to {}", path);
    }
    Ok(())
}

fn cmd_plan(mut args: PlanArgs, config_path: Option<&Utf8Path>) -> anyhow::Result<()> {
    let settings = settings_from(&mut args.manifest, config_path, false)?;
    if settings.manifest.is_empty() {
        info!("no files given; pass --file PATH=GROUP or list [[files]] in pbxfix.toml");
    }

    let outcome = run_plan(&settings, &FsProjectSource, tool())?;
    print!("{}", outcome.patch);
    finish(&outcome, args.manifest.report.as_deref())
}

fn cmd_apply(mut args: ApplyArgs, config_path: Option<&Utf8Path>) -> anyhow::Result<()> {
    let mut settings = settings_from(&mut args.manifest, config_path, args.no_backup)?;
    settings.dry_run = args.dry_run;

    let outcome = run_apply(&settings, &FsProjectSource, &FsWritePort, tool())?;
    if let Some(backup) = &outcome.backup {
        info!("backed up {} to {}", outcome.project, backup);
    }
    finish(&outcome, args.manifest.report.as_deref())
}

fn cmd_groups(args: GroupsArgs, config_path: Option<&Utf8Path>) -> anyhow::Result<()> {
    let merged = load_merged(
        config_path,
        CliOverrides {
            project: args.project.project,
            ..Default::default()
        },
    )?;
    let project = project_path(merged.project)?;
    let groups = list_groups(&project, &FsProjectSource)?;

    match args.format {
        OutputFormat::Text => {
            for group in groups {
                println!("{group}");
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&groups)?),
    }
    Ok(())
}
