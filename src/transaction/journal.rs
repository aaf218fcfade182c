//! Commit journal (`.<name>.updraft-journal.json`)
//!
//! Exists only while a commit is in flight. If the installer dies between the
//! two renames, the journal is what lets [`super::recover`] decide whether to
//! roll the swap back or forward.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{self, Result};

const JOURNAL_SUFFIX: &str = "journal.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitJournal {
    /// Live install location
    pub target: PathBuf,

    /// Staging directory holding `payload/` and, during the swap, `backup/`
    pub staging_root: PathBuf,

    /// Version being installed
    pub candidate_version: String,

    pub bundle_identifier: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl CommitJournal {
    /// Where the journal for `target` is stored
    pub fn path_for(target: &Path) -> Result<PathBuf> {
        super::sidecar_path(target, JOURNAL_SUFFIX)
    }

    /// Staged payload inside the staging root
    pub fn staged_payload(&self) -> PathBuf {
        self.staging_root.join(crate::installer::staging::PAYLOAD_DIR)
    }

    /// Parked previous install inside the staging root
    pub fn backup(&self) -> PathBuf {
        self.staging_root.join(crate::installer::staging::BACKUP_DIR)
    }

    /// Load the journal for `target`, if a commit was interrupted
    pub fn load(target: &Path) -> Result<Option<Self>> {
        let path = Self::path_for(target)?;
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(error::fs::staging_failed(&path, e)),
        };

        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| error::fs::staging_failed(&path, format!("corrupt commit journal: {e}")))
    }

    pub fn store(&self) -> io::Result<()> {
        let path = Self::path_for(&self.target).map_err(io::Error::other)?;
        write_json_atomically(&path, self)
    }

    /// Remove the journal; a missing journal is not an error
    pub fn clear(target: &Path) -> io::Result<()> {
        let path = Self::path_for(target).map_err(io::Error::other)?;
        match std::fs::remove_file(&path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Write JSON to a temporary sibling, flush it to disk and rename it over `path`
pub(crate) fn write_json_atomically<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;

    let mut file = tempfile::NamedTempFile::new_in(parent)?;
    serde_json::to_writer_pretty(&mut file, value)?;
    file.write_all(b"\n")?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
