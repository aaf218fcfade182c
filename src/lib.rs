//! Updraft - package installer engine for application auto-update clients
//!
//! Applies an already-downloaded update package to an installed application:
//! the package is inspected, checked against the installed version, staged
//! beside the install, and swapped in with a rename. A failed swap is rolled
//! back; an interrupted one is repaired by [`transaction::recover`] on the
//! next run.
//!
//! ```ignore
//! use updraft::{HostContext, InstallRequest, StandardVersionComparator, perform_installation};
//!
//! let host = HostContext::new("1.0.0", "/opt/example", "org.example.app");
//! let request = InstallRequest::new(
//!     "/opt/example",
//!     "/var/cache/updates/example-1.2.0.updraft",
//!     host,
//!     StandardVersionComparator,
//! );
//! let summary = perform_installation(request).await?;
//! ```

pub mod cancel;
pub mod completion;
pub mod config;
pub mod error;
pub mod hash;
pub mod host;
pub mod installer;
pub mod package;
pub mod transaction;
pub mod version;

#[cfg(test)]
mod test_fixtures;

pub use cancel::CancellationToken;
pub use completion::{InstallHandle, perform_installation, perform_installation_with};
pub use config::{InstallOptions, InstallerConfig};
pub use error::{ErrorKind, InstallError, PackageIssue, Result};
pub use host::HostContext;
pub use installer::{
    InstallOutcome, InstallRequest, InstallState, InstallSummary, InstallerKind, run,
};
pub use package::PackageDescriptor;
pub use transaction::{RecoveryReport, recover};
pub use version::{
    GateDecision, GatePolicy, StandardVersionComparator, VersionComparator, VersionRejection,
    check_upgrade,
};
