//! Staging area next to the install location
//!
//! Staging happens in a hidden sibling of the target so the final swap is a
//! same-file-system rename. The directory is removed when the [`StagingArea`]
//! is dropped, which covers every failure and cancellation path.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use super::file_ops::InstallIo;
use crate::error::{self, Result};
use crate::transaction;

/// Sub-directory of the staging root holding the new payload
pub const PAYLOAD_DIR: &str = "payload";

/// Sub-directory of the staging root the previous install is parked in
pub const BACKUP_DIR: &str = "backup";

#[derive(Debug)]
pub struct StagingArea {
    root: TempDir,
    payload: PathBuf,
}

impl StagingArea {
    /// Create an empty staging area beside `target`
    pub fn create(target: &Path, io: &dyn InstallIo) -> Result<Self> {
        let parent = target
            .parent()
            .ok_or_else(|| error::request::invalid("target has no parent directory"))?;
        io.create_dir_all(parent)
            .map_err(|e| error::fs::staging_failed(parent, e))?;

        let root = tempfile::Builder::new()
            .prefix(&transaction::staging_prefix(target)?)
            .tempdir_in(parent)
            .map_err(|e| error::fs::staging_failed(parent, e))?;

        let payload = root.path().join(PAYLOAD_DIR);
        io.create_dir_all(&payload)
            .map_err(|e| error::fs::staging_failed(&payload, e))?;

        debug!(path = %root.path().display(), "Created staging area");
        Ok(Self { root, payload })
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Where the payload is materialised
    pub fn payload(&self) -> &Path {
        &self.payload
    }

    /// Where the previous install is parked during the swap
    pub fn backup(&self) -> PathBuf {
        self.root.path().join(BACKUP_DIR)
    }

    /// Leave the staging area on disk instead of removing it on drop
    pub fn keep(self) -> PathBuf {
        self.root.keep()
    }
}
