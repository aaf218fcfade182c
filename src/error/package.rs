//! Package inspection errors

use std::path::Path;

use super::{InstallError, PackageIssue};

fn invalid_package(path: &Path, reason: PackageIssue, detail: impl Into<String>) -> InstallError {
    InstallError::InvalidPackage {
        path: path.display().to_string(),
        reason,
        detail: detail.into(),
    }
}

/// Creates a package not found error
pub fn not_found(path: &Path, detail: impl Into<String>) -> InstallError {
    invalid_package(path, PackageIssue::NotFound, detail)
}

/// Creates a malformed package error
pub fn malformed(path: &Path, detail: impl Into<String>) -> InstallError {
    invalid_package(path, PackageIssue::Malformed, detail)
}

/// Creates an unsupported package format error
pub fn unsupported_format(path: &Path, detail: impl Into<String>) -> InstallError {
    invalid_package(path, PackageIssue::UnsupportedFormat, detail)
}

/// Creates a bundle identifier mismatch error
pub fn identifier_mismatch(path: &Path, expected: &str, declared: &str) -> InstallError {
    invalid_package(
        path,
        PackageIssue::IdentifierMismatch,
        format!("package is for '{declared}', installed application is '{expected}'"),
    )
}

/// Creates a missing checksum error
pub fn missing_checksum(path: &Path) -> InstallError {
    invalid_package(
        path,
        PackageIssue::MissingChecksum,
        "package declares no payload checksum",
    )
}

/// Creates a pack failed error
pub fn pack_failed(path: &Path, reason: impl ToString) -> InstallError {
    InstallError::PackFailed {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}
