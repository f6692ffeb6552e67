//! On-disk mirror of the current snapshot.
//!
//! Two files per data directory: `last.html` holds the raw body and
//! `last.json` the pretty-printed structured document. Each write goes to a
//! `.tmp` sibling first and is renamed into place, so a reader of the
//! directory sees either the old file or the new one in full.

use std::path::{Path, PathBuf};

use crate::types::{PersistResult, Snapshot};

/// File name of the raw body mirror.
pub const RAW_FILE: &str = "last.html";

/// File name of the structured document mirror.
pub const DOCUMENT_FILE: &str = "last.json";

/// Durable copy of the snapshot in a data directory.
#[derive(Debug, Clone)]
pub struct SnapshotMirror {
    dir: PathBuf,
}

impl SnapshotMirror {
    /// Open the mirror, creating the data directory if needed.
    ///
    /// Failing here means the process cannot keep a durable copy at all, so
    /// callers treat it as a startup error.
    pub fn open(dir: impl Into<PathBuf>) -> PersistResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        tracing::debug!("snapshot mirror ready at {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn raw_path(&self) -> PathBuf {
        self.dir.join(RAW_FILE)
    }

    pub fn document_path(&self) -> PathBuf {
        self.dir.join(DOCUMENT_FILE)
    }

    /// Overwrite both files with the given snapshot.
    pub fn write(&self, snapshot: &Snapshot) -> PersistResult<()> {
        let document = snapshot.document().to_pretty_json()?;
        replace_file(&self.raw_path(), snapshot.raw_body())?;
        replace_file(&self.document_path(), document.as_bytes())?;
        Ok(())
    }
}

fn replace_file(path: &Path, contents: &[u8]) -> PersistResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
