//! Port traits abstracting all I/O away from the pipeline.

use camino::{Utf8Path, Utf8PathBuf};

/// Source of project file contents.
pub trait ProjectSource {
    /// The raw bytes of the project file. Decoding is left to the pipeline.
    fn read_project(&self, path: &Utf8Path) -> anyhow::Result<Vec<u8>>;
}

/// File-system write operations.
pub trait WritePort {
    /// Replace `path` with `contents` so that readers see either the old or the new bytes.
    fn write_atomic(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()>;

    /// Copy the current contents of `path` aside and return where they went.
    fn write_backup(&self, path: &Utf8Path, suffix: &str) -> anyhow::Result<Utf8PathBuf>;

    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()>;
}
