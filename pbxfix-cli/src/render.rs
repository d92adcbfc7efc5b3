//! Human-readable output for plan and apply runs.

use pbxfix_types::report::AddReport;
use std::fmt::Write;

/// One line per added file, created group and skipped file, then a summary line.
pub fn confirmation(report: &AddReport) -> String {
    let verb = if report.applied { "added" } else { "would add" };
    let mut out = String::new();

    for group in &report.groups_created {
        let _ = writeln!(out, "created group {}", group.path);
    }
    for file in &report.added {
        let phase = if file.build_file.is_some() {
            ""
        } else {
            " (not compiled)"
        };
        let _ = writeln!(out, "{verb} {} -> {}{phase}", file.path, file.group);
    }
    for skip in &report.skipped {
        let _ = writeln!(out, "skipped {} ({})", skip.path, skip.reason.as_str());
    }

    let s = &report.summary;
    let _ = writeln!(
        out,
        "{} file(s) {verb}, {} skipped, {} group(s) created",
        s.files_added,
        s.files_skipped,
        s.groups_created
    );
    out
}
