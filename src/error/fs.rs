//! File system errors raised while staging, committing and recovering

use std::path::Path;

use super::InstallError;

/// Creates a staging failed error
pub fn staging_failed(path: &Path, reason: impl ToString) -> InstallError {
    InstallError::StagingFailed {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Creates a checksum mismatch error
pub fn checksum_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> InstallError {
    InstallError::ChecksumMismatch {
        expected: expected.into(),
        actual: actual.into(),
    }
}

/// Creates a commit failed error
pub fn commit_failed(target: &Path, reason: impl ToString) -> InstallError {
    InstallError::CommitFailed {
        target: target.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Creates an unrecoverable state error
pub fn unrecoverable(target: &Path, reason: impl ToString, backup: Option<&Path>) -> InstallError {
    InstallError::UnrecoverableState {
        target: target.display().to_string(),
        reason: reason.to_string(),
        backup: backup.map_or_else(|| "none".to_string(), |p| p.display().to_string()),
    }
}
