//! Recovery after an interrupted install
//!
//! Runs before every install and can be invoked on its own. It never reports
//! an upgrade unless the staged payload was actually renamed into place.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use super::{CommitJournal, InstallReceipt};
use crate::error::{self, Result};

/// What a recovery pass found and did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    /// An interrupted swap was undone and the previous install restored
    pub rolled_back: bool,

    /// An interrupted swap had completed; this is the version now installed
    pub rolled_forward: Option<String>,

    /// Orphaned staging directories that were removed
    pub removed_staging: Vec<PathBuf>,
}

impl RecoveryReport {
    /// Whether there was nothing to recover
    pub fn is_clean(&self) -> bool {
        !self.rolled_back && self.rolled_forward.is_none() && self.removed_staging.is_empty()
    }
}

fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Finish or undo an interrupted commit recorded in `journal`
fn resolve_journal(journal: &CommitJournal, report: &mut RecoveryReport) -> Result<()> {
    let target = &journal.target;
    let backup = journal.backup();

    if !exists(target) && exists(&backup) {
        // Crashed between the two renames: put the previous install back
        fs::rename(&backup, target).map_err(|e| {
            error::fs::unrecoverable(target, format!("restoring backup failed: {e}"), Some(&backup))
        })?;
        info!(path = %target.display(), "Restored previous install from interrupted commit");
        report.rolled_back = true;
        return Ok(());
    }

    if exists(target) && exists(&journal.staging_root) && !exists(&journal.staged_payload()) {
        // The payload rename went through; only bookkeeping was lost
        let receipt = InstallReceipt {
            bundle_identifier: journal.bundle_identifier.clone(),
            version: journal.candidate_version.clone(),
            checksum: journal.checksum.clone(),
        };
        receipt
            .store(target)
            .map_err(|e| error::fs::staging_failed(target, format!("writing receipt: {e}")))?;
        info!(
            path = %target.display(),
            version = %journal.candidate_version,
            "Completed interrupted commit"
        );
        report.rolled_forward = Some(journal.candidate_version.clone());
    }

    Ok(())
}

/// Remove staging directories left beside `target` by earlier runs
fn sweep_staging(target: &Path, report: &mut RecoveryReport) -> Result<()> {
    let prefix = super::staging_prefix(target)?;
    let Some(parent) = target.parent() else {
        return Ok(());
    };

    let entries = match fs::read_dir(parent) {
        Ok(entries) => entries,
        // Nothing can be orphaned under a directory that does not exist yet
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(error::fs::staging_failed(parent, e)),
    };

    for entry in entries {
        let entry = entry.map_err(|e| error::fs::staging_failed(parent, e))?;
        if !entry.file_name().to_string_lossy().starts_with(&prefix) {
            continue;
        }

        let path = entry.path();
        fs::remove_dir_all(&path).map_err(|e| error::fs::staging_failed(&path, e))?;
        warn!(path = %path.display(), "Removed orphaned staging directory");
        report.removed_staging.push(path);
    }

    Ok(())
}

/// Bring the install at `target` back to a consistent state
///
/// With a commit journal present, an interrupted swap is rolled back when the
/// previous install is parked and the target is missing, or rolled forward
/// when the staged payload already moved into place. Staging directories are
/// then removed, and the journal last of all.
pub fn recover(target: &Path) -> Result<RecoveryReport> {
    let mut report = RecoveryReport::default();

    let journal = CommitJournal::load(target)?;
    if let Some(journal) = &journal {
        warn!(path = %target.display(), "Found journal of an interrupted commit");
        resolve_journal(journal, &mut report)?;
    }

    sweep_staging(target, &mut report)?;

    if journal.is_some() {
        CommitJournal::clear(target).map_err(|e| error::fs::staging_failed(target, e))?;
    }

    Ok(report)
}
