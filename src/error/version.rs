//! Version gate errors

use super::InstallError;
use crate::version::VersionRejection;

/// Creates a version rejected error
pub fn rejected(
    reason: VersionRejection,
    installed: impl Into<String>,
    candidate: impl Into<String>,
) -> InstallError {
    InstallError::VersionRejected {
        reason,
        installed: installed.into(),
        candidate: candidate.into(),
    }
}
