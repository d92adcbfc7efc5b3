//! Edit engine for Xcode project documents.
//!
//! Responsibilities:
//! - Decode project bytes without losing any that are not UTF-8.
//! - Load a `project.pbxproj` into a section/record index without reformatting it.
//! - Queue insertions at exact byte offsets and serialize them back in one pass.
//! - Hash contents, render unified diffs and write files atomically.

pub mod document;
pub mod encoding;
pub mod error;
pub mod plist;

pub use document::{Document, ListEntry, Record, Section, end_marker};
pub use encoding::TextEncoding;
pub use error::{DocumentError, EditError, EditResult};
pub use plist::quote;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use diffy::PatchFormatter;
use fs_err as fs;
use sha2::{Digest, Sha256};
use std::io::Write;
use tracing::debug;

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Unified diff of one file, with git-style headers. Empty when nothing changed.
pub fn render_patch(path: &str, before: &str, after: &str) -> String {
    if before == after {
        return String::new();
    }

    let mut out = String::new();
    out.push_str(&format!("diff --git a/{0} b/{0}\n", path));
    out.push_str(&format!("--- a/{0}\n+++ b/{0}\n", path));

    let patch = diffy::create_patch(before, after);
    let formatted = PatchFormatter::new().fmt_patch(&patch).to_string();
    // diffy emits its own `--- original` / `+++ modified` header pair.
    let hunks = match formatted.strip_prefix("--- ") {
        Some(_) => formatted.splitn(3, '\n').nth(2).unwrap_or(""),
        None => formatted.as_str(),
    };
    out.push_str(hunks);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Replace `path` with `contents` through a temporary file in the same directory.
///
/// Readers observe either the old or the new contents, never a partial write. The original
/// file's permissions are carried over.
pub fn write_atomic(path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_str().is_empty() => p,
        _ => Utf8Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("create temporary file in {}", dir))?;
    tmp.write_all(contents)
        .with_context(|| format!("write temporary file for {}", path))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("sync temporary file for {}", path))?;

    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), meta.permissions())
            .with_context(|| format!("copy permissions of {}", path))?;
    }

    tmp.persist(path)
        .with_context(|| format!("replace {}", path))?;
    debug!(path = %path, bytes = contents.len(), "wrote file atomically");
    Ok(())
}

/// Path of the backup copy for `path`: the file name with `suffix` appended.
pub fn backup_path(path: &Utf8Path, suffix: &str) -> Utf8PathBuf {
    let name = path.file_name().unwrap_or("project.pbxproj");
    path.with_file_name(format!("{name}{suffix}"))
}

/// Copy the current contents of `path` next to it before it gets replaced.
pub fn write_backup(path: &Utf8Path, suffix: &str) -> anyhow::Result<Utf8PathBuf> {
    let backup = backup_path(path, suffix);
    fs::copy(path, &backup).with_context(|| format!("back up {} to {}", path, backup))?;
    debug!(backup = %backup, "wrote backup");
    Ok(backup)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn render_patch_is_empty_without_changes() {
        assert_eq!(render_patch("a.pbxproj", "x\n", "x\n"), "");
    }

    #[test]
    fn render_patch_uses_git_headers() {
        let patch = render_patch("App.xcodeproj/project.pbxproj", "a\nb\n", "a\nc\nb\n");
        assert!(patch.starts_with("diff --git a/App.xcodeproj/project.pbxproj"));
        assert!(patch.contains("+++ b/App.xcodeproj/project.pbxproj\n@@"));
        assert!(patch.contains("+c\n"));
        assert!(!patch.contains("original"));
    }

    #[test]
    fn backup_path_appends_suffix() {
        let p = backup_path(Utf8Path::new("App.xcodeproj/project.pbxproj"), ".pbxfix.bak");
        assert_eq!(p.as_str(), "App.xcodeproj/project.pbxproj.pbxfix.bak");
    }
}
