//! Transaction support for the commit step
//!
//! The commit swaps the staged payload into place with two renames, so the
//! target is always either the old install or the new one. This module
//! provides:
//! - [`SwapTransaction`]: the rename pair, rolled back automatically on drop
//!   unless committed
//! - [`CommitJournal`]: an on-disk record of an in-flight commit
//! - [`InstallReceipt`]: what the last successful commit installed
//! - [`recover`]: cleanup after an installer that died mid-operation
//!
//! ## Usage
//!
//! ```ignore
//! let mut swap = SwapTransaction::new(&target, &staged, &backup, io);
//! swap.backup_target()?;
//! swap.install_payload()?;
//!
//! // On success:
//! swap.commit();
//!
//! // On error (automatic via Drop if not committed):
//! // rollback happens automatically
//! ```

pub mod journal;
pub mod receipt;
pub mod recovery;


use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{self, Result};
use crate::installer::file_ops::InstallIo;

pub use journal::CommitJournal;
pub use receipt::InstallReceipt;
pub use recovery::{RecoveryReport, recover};

/// Marker shared by every file Updraft keeps beside an install
const SIDECAR_MARKER: &str = "updraft";

fn split_target(target: &Path) -> Result<(&Path, String)> {
    let parent = target.parent().filter(|p| !p.as_os_str().is_empty());
    let name = target.file_name().map(|n| n.to_string_lossy().into_owned());
    match (parent, name) {
        (Some(parent), Some(name)) => Ok((parent, name)),
        _ => Err(error::request::invalid(format!(
            "{} has no parent directory",
            target.display()
        ))),
    }
}

/// Path of a bookkeeping file kept next to `target`
pub(crate) fn sidecar_path(target: &Path, suffix: &str) -> Result<PathBuf> {
    let (parent, name) = split_target(target)?;
    Ok(parent.join(format!(".{name}.{SIDECAR_MARKER}-{suffix}")))
}

/// Prefix of staging directories created for `target`
pub(crate) fn staging_prefix(target: &Path) -> Result<String> {
    let (_, name) = split_target(target)?;
    Ok(format!(".{name}.{SIDECAR_MARKER}-staging-"))
}

/// The rename pair that makes a staged payload live
pub struct SwapTransaction<'a> {
    /// Live install location
    target: PathBuf,

    /// Fully staged payload
    staged: PathBuf,

    /// Where the previous install is parked during the swap
    backup: PathBuf,

    /// The previous install has been moved to `backup`
    backed_up: bool,

    /// The staged payload has been moved to `target`
    installed: bool,

    /// Whether the transaction has been committed
    committed: bool,

    io: &'a dyn InstallIo,
}

impl<'a> SwapTransaction<'a> {
    pub fn new(target: &Path, staged: &Path, backup: &Path, io: &'a dyn InstallIo) -> Self {
        Self {
            target: target.to_path_buf(),
            staged: staged.to_path_buf(),
            backup: backup.to_path_buf(),
            backed_up: false,
            installed: false,
            committed: false,
            io,
        }
    }

    /// Move the current install out of the way
    ///
    /// A missing target is a fresh install and nothing is moved.
    pub fn backup_target(&mut self) -> io::Result<()> {
        if std::fs::symlink_metadata(&self.target).is_err() {
            debug!(path = %self.target.display(), "No previous install to back up");
            return Ok(());
        }

        self.io.rename(&self.target, &self.backup)?;
        self.backed_up = true;
        debug!(backup = %self.backup.display(), "Previous install moved aside");
        Ok(())
    }

    /// Move the staged payload into the live location
    pub fn install_payload(&mut self) -> io::Result<()> {
        self.io.rename(&self.staged, &self.target)?;
        self.installed = true;
        Ok(())
    }

    /// Location of the parked previous install, if one was moved
    pub fn backup(&self) -> Option<&Path> {
        self.backed_up.then_some(self.backup.as_path())
    }

    /// Commit the transaction (prevent rollback)
    pub fn commit(mut self) {
        self.committed = true;
    }

    /// Stop tracking without touching the file system
    ///
    /// Used when rollback itself failed: whatever is on disk is left for
    /// [`recover`] or an operator.
    pub fn abandon(mut self) {
        self.committed = true;
    }

    /// Put the previous install back
    pub fn rollback(&mut self) -> io::Result<()> {
        if self.committed {
            return Ok(());
        }

        if self.installed {
            if let Err(e) = self.io.rename(&self.target, &self.staged) {
                warn!(error = %e, "Could not move new payload back to staging, removing it");
                std::fs::remove_dir_all(&self.target)?;
            }
            self.installed = false;
        }

        if self.backed_up {
            self.io.rename(&self.backup, &self.target)?;
            self.backed_up = false;
        }

        Ok(())
    }
}

impl Drop for SwapTransaction<'_> {
    fn drop(&mut self) {
        if !self.committed && (self.installed || self.backed_up) {
            // Automatic rollback on drop if not committed
            if let Err(e) = self.rollback() {
                warn!(path = %self.target.display(), error = %e, "Rollback failed");
            }
        }
    }
}
