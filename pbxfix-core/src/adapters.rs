//! Default filesystem-backed port implementations.

use crate::ports::{ProjectSource, WritePort};
use anyhow::anyhow;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::debug;

/// Reads project files from disk.
#[derive(Debug, Clone, Default)]
pub struct FsProjectSource;

impl ProjectSource for FsProjectSource {
    fn read_project(&self, path: &Utf8Path) -> anyhow::Result<Vec<u8>> {
        Ok(fs::read(path)?)
    }
}

/// Filesystem write operations via the `pbxfix_edit` helpers.
#[derive(Debug, Clone, Default)]
pub struct FsWritePort;

impl WritePort for FsWritePort {
    fn write_atomic(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()> {
        pbxfix_edit::write_atomic(path, contents)
    }

    fn write_backup(&self, path: &Utf8Path, suffix: &str) -> anyhow::Result<Utf8PathBuf> {
        pbxfix_edit::write_backup(path, suffix)
    }

    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }
}

/// In-memory project store for embedding and testing.
///
/// Implements both ports over one map of path to contents, so a plan or apply can run without
/// touching the disk.
#[derive(Debug, Default)]
pub struct InMemoryProject {
    files: Mutex<BTreeMap<Utf8PathBuf, Vec<u8>>>,
}

impl InMemoryProject {
    pub fn new(path: impl Into<Utf8PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        let store = Self::default();
        store.insert(path, contents);
        store
    }

    pub fn insert(&self, path: impl Into<Utf8PathBuf>, contents: impl Into<Vec<u8>>) {
        if let Ok(mut files) = self.files.lock() {
            files.insert(path.into(), contents.into());
        }
    }

    /// Contents of `path` as text, decoded the way the pipeline decodes projects.
    pub fn get(&self, path: &Utf8Path) -> Option<String> {
        self.get_bytes(path)
            .map(|bytes| pbxfix_edit::encoding::decode(&bytes).0)
    }

    pub fn get_bytes(&self, path: &Utf8Path) -> Option<Vec<u8>> {
        self.files.lock().ok()?.get(path).cloned()
    }

    fn with_files<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<Utf8PathBuf, Vec<u8>>) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let mut files = self
            .files
            .lock()
            .map_err(|_| anyhow!("in-memory project store poisoned"))?;
        f(&mut files)
    }
}

impl ProjectSource for InMemoryProject {
    fn read_project(&self, path: &Utf8Path) -> anyhow::Result<Vec<u8>> {
        self.with_files(|files| {
            files
                .get(path)
                .cloned()
                .ok_or_else(|| anyhow!("no such project: {}", path))
        })
    }
}

impl WritePort for InMemoryProject {
    fn write_atomic(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()> {
        self.with_files(|files| {
            files.insert(path.to_path_buf(), contents.to_vec());
            Ok(())
        })
    }

    fn write_backup(&self, path: &Utf8Path, suffix: &str) -> anyhow::Result<Utf8PathBuf> {
        let backup = pbxfix_edit::backup_path(path, suffix);
        self.with_files(|files| {
            let current = files
                .get(path)
                .cloned()
                .ok_or_else(|| anyhow!("no such project: {}", path))?;
            debug!(backup = %backup, "in-memory backup");
            files.insert(backup.clone(), current);
            Ok(backup)
        })
    }

    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()> {
        self.write_atomic(path, contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn in_memory_round_trips_and_backs_up() {
        let path = Utf8Path::new("App.xcodeproj/project.pbxproj");
        let store = InMemoryProject::new(path, "before");

        let backup = store.write_backup(path, ".bak").unwrap();
        store.write_atomic(path, b"after").unwrap();

        assert_eq!(store.read_project(path).unwrap(), b"after");
        assert_eq!(backup.as_str(), "App.xcodeproj/project.pbxproj.bak");
        assert_eq!(store.get(&backup).as_deref(), Some("before"));
    }

    #[test]
    fn in_memory_missing_project_is_an_error() {
        let store = InMemoryProject::default();
        let err = store.read_project(Utf8Path::new("nope.pbxproj")).unwrap_err();
        assert!(err.to_string().contains("no such project"));
    }

    #[test]
    fn fs_source_returns_raw_bytes() {
        let temp = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let path = root.join("project.pbxproj");
        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

        assert_eq!(FsProjectSource.read_project(&path).unwrap(), vec![0xff, 0xfe, 0x00]);
    }

    #[test]
    fn in_memory_keeps_non_utf8_bytes() {
        let path = Utf8Path::new("App.xcodeproj/project.pbxproj");
        let store = InMemoryProject::new(path, b"/* caf\xe9 */".to_vec());

        store.write_atomic(path, b"/* caf\xe9 */\n").unwrap();

        assert_eq!(store.get_bytes(path).unwrap(), b"/* caf\xe9 */\n");
        assert_eq!(store.get(path).as_deref(), Some("/* caf\u{e9} */\n"));
    }

    #[test]
    fn fs_write_file_creates_parent_dirs() {
        let temp = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let path = root.join("out/reports/report.json");

        FsWritePort.write_file(&path, b"{}").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }
}
