//! Error types and handling for Updraft
//!
//! Uses `thiserror` for error definitions and `miette` for pretty diagnostics.
//!
//! Every failure an installation can end in is an [`InstallError`]; its
//! [`ErrorKind`] is the stable taxonomy callers branch on. Constructor helpers
//! are grouped by the phase that raises them:
//! - [`request`]: request precondition errors
//! - [`config`]: configuration file errors
//! - [`package`]: package inspection errors
//! - [`version`]: version gate errors
//! - [`fs`]: staging, commit and recovery errors

pub mod config;
pub mod fs;
pub mod package;
pub mod request;
pub mod version;


use std::fmt;

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

use crate::version::VersionRejection;

/// Stable classification of an installation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad preconditions; a caller defect, never retried
    InvalidRequest,
    /// Unreadable or malformed package; retry only with a different package
    InvalidPackage,
    /// Downgrade or duplicate install without an override
    VersionRejected,
    /// I/O or environment failure while staging
    StagingFailed,
    /// The swap failed and the previous install was restored
    CommitFailed,
    /// Cooperative cancellation
    Cancelled,
    /// Commit and rollback both failed; the install may be corrupt
    UnrecoverableState,
}

impl ErrorKind {
    /// Whether retrying the same request can succeed once the environment changes
    pub fn is_retriable(self) -> bool {
        matches!(
            self,
            ErrorKind::StagingFailed | ErrorKind::CommitFailed | ErrorKind::Cancelled
        )
    }

    /// Whether the engine must not attempt any further automatic action
    pub fn is_fatal(self) -> bool {
        self == ErrorKind::UnrecoverableState
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidRequest => "invalid request",
            ErrorKind::InvalidPackage => "invalid package",
            ErrorKind::VersionRejected => "version rejected",
            ErrorKind::StagingFailed => "staging failed",
            ErrorKind::CommitFailed => "commit failed",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::UnrecoverableState => "unrecoverable state",
        };
        f.write_str(name)
    }
}

/// Why a package was refused by the inspector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageIssue {
    NotFound,
    Malformed,
    UnsupportedFormat,
    IdentifierMismatch,
    MissingChecksum,
}

impl fmt::Display for PackageIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            PackageIssue::NotFound => "not found",
            PackageIssue::Malformed => "malformed",
            PackageIssue::UnsupportedFormat => "unsupported format",
            PackageIssue::IdentifierMismatch => "bundle identifier mismatch",
            PackageIssue::MissingChecksum => "missing checksum",
        };
        f.write_str(reason)
    }
}

/// Main error type for Updraft operations
#[derive(Error, Diagnostic, Debug)]
pub enum InstallError {
    // Request errors
    #[error("Invalid install request: {message}")]
    #[diagnostic(
        code(updraft::request::invalid),
        help("Target and package paths must be absolute and the host context complete")
    )]
    InvalidRequest { message: String },

    // Configuration errors
    #[error("Failed to read configuration file: {path}")]
    #[diagnostic(code(updraft::config::read_failed))]
    ConfigReadFailed { path: String, reason: String },

    #[error("Failed to parse configuration file: {path}: {reason}")]
    #[diagnostic(
        code(updraft::config::parse_failed),
        help(
            "Recognised keys: force_reinstall, allow_downgrade, verify_checksum, require_checksum, require_matching_identifier"
        )
    )]
    ConfigParseFailed { path: String, reason: String },

    // Package errors
    #[error("Invalid package at {path} ({reason}): {detail}")]
    #[diagnostic(
        code(updraft::package::invalid),
        help("Retry with a different package; this one cannot be installed")
    )]
    InvalidPackage {
        path: String,
        reason: PackageIssue,
        detail: String,
    },

    // Version gate errors
    #[error("Version {candidate} rejected over installed {installed}: {reason}")]
    #[diagnostic(
        code(updraft::version::rejected),
        help("Pass --force to reinstall the same version or --allow-downgrade to go back")
    )]
    VersionRejected {
        reason: VersionRejection,
        installed: String,
        candidate: String,
    },

    // Staging errors
    #[error("Failed to stage payload at {path}: {reason}")]
    #[diagnostic(
        code(updraft::fs::staging_failed),
        help("Check free disk space and permissions next to the install location, then retry")
    )]
    StagingFailed { path: String, reason: String },

    #[error("Payload checksum mismatch: expected {expected}, got {actual}")]
    #[diagnostic(code(updraft::fs::checksum_mismatch))]
    ChecksumMismatch { expected: String, actual: String },

    // Commit errors
    #[error("Failed to commit {target}, previous install restored: {reason}")]
    #[diagnostic(code(updraft::fs::commit_failed))]
    CommitFailed { target: String, reason: String },

    // Packing errors
    #[error("Failed to pack {path}: {reason}")]
    #[diagnostic(code(updraft::package::pack_failed))]
    PackFailed { path: String, reason: String },

    // Command line errors
    #[error("Failed to write output: {reason}")]
    #[diagnostic(code(updraft::cli::output_failed))]
    OutputFailed { reason: String },

    #[error("Installation cancelled")]
    #[diagnostic(code(updraft::cancelled))]
    Cancelled,

    #[error("Install at {target} is in an unrecoverable state: {reason} (backup: {backup})")]
    #[diagnostic(
        code(updraft::fs::unrecoverable),
        severity(Error),
        help("The application may be corrupt. Do not retry; restore it from the backup by hand")
    )]
    UnrecoverableState {
        target: String,
        reason: String,
        backup: String,
    },
}

impl InstallError {
    /// The stable classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            InstallError::InvalidRequest { .. }
            | InstallError::ConfigReadFailed { .. }
            | InstallError::ConfigParseFailed { .. }
            | InstallError::OutputFailed { .. } => ErrorKind::InvalidRequest,
            InstallError::InvalidPackage { .. } | InstallError::PackFailed { .. } => {
                ErrorKind::InvalidPackage
            }
            InstallError::VersionRejected { .. } => ErrorKind::VersionRejected,
            InstallError::StagingFailed { .. } | InstallError::ChecksumMismatch { .. } => {
                ErrorKind::StagingFailed
            }
            InstallError::CommitFailed { .. } => ErrorKind::CommitFailed,
            InstallError::Cancelled => ErrorKind::Cancelled,
            InstallError::UnrecoverableState { .. } => ErrorKind::UnrecoverableState,
        }
    }
}

/// Result type alias using miette for error handling
pub type Result<T> = miette::Result<T, InstallError>;
