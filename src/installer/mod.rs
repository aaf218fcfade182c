//! Installation engine
//!
//! Applies one package to one install location:
//!
//! ```text
//! Idle → Inspecting → Gating → Staging → Committing → Completed
//! ```
//!
//! Every path ends in `Completed`. Before the gate has passed and the staged
//! payload is verified, nothing at the target is touched; after that, the only
//! mutation is the rename swap in [`InstallerKind::commit`].

pub mod file_ops;
pub mod kind;
pub mod staging;

#[cfg(test)]
mod tests;

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::cancel::CancellationToken;
use crate::config::InstallOptions;
use crate::error::{self, InstallError, Result};
use crate::hash;
use crate::host::HostContext;
use crate::package::PackageDescriptor;
use crate::transaction::{self, InstallReceipt};
use crate::version::{GateDecision, VersionComparator, check_upgrade};

pub use file_ops::{InstallIo, OsIo};
pub use kind::InstallerKind;
pub use staging::StagingArea;

/// Engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallState {
    Idle,
    Inspecting,
    Gating,
    Staging,
    Committing,
    Completed,
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstallState::Idle => "idle",
            InstallState::Inspecting => "inspecting",
            InstallState::Gating => "gating",
            InstallState::Staging => "staging",
            InstallState::Committing => "committing",
            InstallState::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Called on every state the engine enters, in order
pub type StateObserver = Arc<dyn Fn(InstallState) + Send + Sync>;

/// What a successful install did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallSummary {
    /// Version that was installed before, as the gate saw it
    pub previous_version: String,
    pub installed_version: String,
    pub target_path: PathBuf,
    pub kind: InstallerKind,
}

/// Result of one installation
pub type InstallOutcome = std::result::Result<InstallSummary, InstallError>;

/// Everything one installation needs
pub struct InstallRequest {
    pub target_path: PathBuf,
    pub package_path: PathBuf,
    pub host: HostContext,
    pub comparator: Arc<dyn VersionComparator>,
    pub options: InstallOptions,
    cancel: CancellationToken,
    observer: Option<StateObserver>,
    io: Arc<dyn InstallIo>,
    installer_executable: Option<PathBuf>,
}

impl fmt::Debug for InstallRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallRequest")
            .field("target_path", &self.target_path)
            .field("package_path", &self.package_path)
            .field("host", &self.host)
            .field("options", &self.options)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("installer_executable", &self.installer_executable)
            .finish_non_exhaustive()
    }
}

impl InstallRequest {
    pub fn new(
        target_path: impl Into<PathBuf>,
        package_path: impl Into<PathBuf>,
        host: HostContext,
        comparator: impl VersionComparator + 'static,
    ) -> Self {
        Self {
            target_path: target_path.into(),
            package_path: package_path.into(),
            host,
            comparator: Arc::new(comparator),
            options: InstallOptions::default(),
            cancel: CancellationToken::new(),
            observer: None,
            io: Arc::new(OsIo),
            installer_executable: None,
        }
    }

    pub fn with_options(mut self, options: InstallOptions) -> Self {
        self.options = options;
        self
    }

    /// Share an existing cancellation token with the engine
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Observe state transitions, e.g. to drive a progress display
    pub fn with_observer(mut self, observer: impl Fn(InstallState) + Send + Sync + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Route file system mutations through `io`
    pub fn with_io(mut self, io: Arc<dyn InstallIo>) -> Self {
        self.io = io;
        self
    }

    /// Path of the running installer, refused as part of the target
    pub fn with_installer_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.installer_executable = Some(path.into());
        self
    }

    /// Token that cancels this request
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Run one installation to completion on the current thread
///
/// Blocks for the whole install. Most callers want
/// [`crate::completion::perform_installation`], which runs this on a worker.
pub fn run(request: InstallRequest) -> InstallOutcome {
    let mut engine = Engine {
        request: &request,
        state: InstallState::Idle,
    };
    engine.notify();

    let outcome = engine.execute();
    engine.transition(InstallState::Completed);

    match &outcome {
        Ok(summary) => info!(
            path = %summary.target_path.display(),
            from = %summary.previous_version,
            to = %summary.installed_version,
            "Installation succeeded"
        ),
        Err(e) if e.kind().is_fatal() => error!(
            path = %request.target_path.display(),
            error = %e,
            "Installation left the application in an unrecoverable state"
        ),
        Err(e) => warn!(
            path = %request.target_path.display(),
            kind = %e.kind(),
            error = %e,
            "Installation failed"
        ),
    }

    outcome
}

struct Engine<'a> {
    request: &'a InstallRequest,
    state: InstallState,
}

impl Engine<'_> {
    fn notify(&self) {
        if let Some(observer) = &self.request.observer {
            observer(self.state);
        }
    }

    fn transition(&mut self, next: InstallState) {
        debug!(from = %self.state, to = %next, "State transition");
        self.state = next;
        self.notify();
    }

    fn execute(&mut self) -> Result<InstallSummary> {
        let request = self.request;
        let target = request.target_path.as_path();
        let io = request.io.as_ref();

        validate(request)?;
        if let Some(pid) = request.host.running_process_id {
            info!(pid, "Application is running; it keeps its old files until it restarts");
        }

        let recovery = transaction::recover(target)?;
        if !recovery.is_clean() {
            info!(
                rolled_back = recovery.rolled_back,
                rolled_forward = ?recovery.rolled_forward,
                removed = recovery.removed_staging.len(),
                "Recovered from an earlier interrupted install"
            );
        }

        self.transition(InstallState::Inspecting);
        let kind = InstallerKind::detect(&request.package_path)?;
        let descriptor = kind.inspect(&request.package_path)?;
        check_package(request, &descriptor)?;
        info!(
            kind = %kind,
            version = %descriptor.declared_version,
            files = descriptor.file_count,
            "Inspected package"
        );
        request.cancel.check()?;

        self.transition(InstallState::Gating);
        let installed = effective_installed_version(request);
        let decision = check_upgrade(
            &installed,
            &descriptor.declared_version,
            request.comparator.as_ref(),
            request.options.gate_policy(),
        );
        if let GateDecision::Deny(reason) = decision {
            return Err(error::version::rejected(
                reason,
                installed,
                descriptor.declared_version,
            ));
        }
        request.cancel.check()?;

        self.transition(InstallState::Staging);
        let staging = StagingArea::create(target, io)?;
        kind.stage(&descriptor, &staging, io, &request.cancel)?;
        verify_staged(request, &descriptor, &staging)?;
        // Last point at which cancellation is honoured
        request.cancel.check()?;

        self.transition(InstallState::Committing);
        let receipt = InstallReceipt {
            bundle_identifier: descriptor
                .bundle_identifier
                .clone()
                .unwrap_or_else(|| request.host.bundle_identifier.clone()),
            version: descriptor.declared_version.clone(),
            checksum: descriptor.checksum.clone(),
        };
        kind.commit(staging, target, &receipt, io)?;

        Ok(InstallSummary {
            previous_version: installed,
            installed_version: descriptor.declared_version,
            target_path: target.to_path_buf(),
            kind,
        })
    }
}

/// Preconditions checked before anything is read or written
fn validate(request: &InstallRequest) -> Result<()> {
    let target = &request.target_path;
    let package = &request.package_path;

    if !target.is_absolute() {
        return Err(error::request::invalid(format!(
            "target path {} is not absolute",
            target.display()
        )));
    }
    if !package.is_absolute() {
        return Err(error::request::invalid(format!(
            "package path {} is not absolute",
            package.display()
        )));
    }
    if target.parent().is_none() || target.file_name().is_none() {
        return Err(error::request::invalid(format!(
            "{} cannot be an install location",
            target.display()
        )));
    }
    if request.host.installed_version.trim().is_empty() {
        return Err(error::request::invalid("host context has no installed version"));
    }
    if request.host.bundle_identifier.trim().is_empty() {
        return Err(error::request::invalid("host context has no bundle identifier"));
    }
    let install_root = lexical_normalize(target);
    if lexical_normalize(package).starts_with(&install_root) {
        return Err(error::request::invalid(format!(
            "package {} lives inside the install location",
            package.display()
        )));
    }
    if let Some(installer) = &request.installer_executable {
        if lexical_normalize(installer).starts_with(&install_root) {
            return Err(error::request::invalid(format!(
                "installer {} would overwrite itself",
                installer.display()
            )));
        }
    }
    let target_is_file = std::fs::metadata(target).is_ok_and(|m| !m.is_dir());
    if target_is_file {
        return Err(error::request::invalid(format!(
            "target {} exists and is not a directory",
            target.display()
        )));
    }
    if request.host.installed_path != *target {
        debug!(
            host = %request.host.installed_path.display(),
            path = %target.display(),
            "Target differs from the host's install location"
        );
    }

    Ok(())
}

/// Resolve `.` and `..` components without touching the file system
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Policy checks on an inspected package
fn check_package(request: &InstallRequest, descriptor: &PackageDescriptor) -> Result<()> {
    let path = &request.package_path;

    if let Some(declared) = &descriptor.bundle_identifier {
        if request.options.require_matching_identifier && *declared != request.host.bundle_identifier
        {
            return Err(error::package::identifier_mismatch(
                path,
                &request.host.bundle_identifier,
                declared,
            ));
        }
    }
    if request.options.require_checksum && descriptor.checksum.is_none() {
        return Err(error::package::missing_checksum(path));
    }

    Ok(())
}

/// The installed version the gate compares against
///
/// The receipt of the last successful install acts as a floor, so a stale
/// host snapshot cannot re-apply a package that is already live.
fn effective_installed_version(request: &InstallRequest) -> String {
    let host_version = request.host.installed_version.trim().to_string();
    let target = &request.target_path;

    if !target.exists() {
        return host_version;
    }

    let receipt = match InstallReceipt::load(target) {
        Ok(Some(receipt)) => receipt,
        Ok(None) => return host_version,
        Err(e) => {
            warn!(error = %e, "Ignoring unreadable install receipt");
            return host_version;
        }
    };

    if receipt.bundle_identifier != request.host.bundle_identifier {
        return host_version;
    }

    if request.comparator.compare(&receipt.version, &host_version) == std::cmp::Ordering::Greater {
        debug!(
            host = %host_version,
            receipt = %receipt.version,
            "Install receipt is newer than the host snapshot"
        );
        receipt.version
    } else {
        host_version
    }
}

/// Check the staged tree against the package checksum
fn verify_staged(
    request: &InstallRequest,
    descriptor: &PackageDescriptor,
    staging: &StagingArea,
) -> Result<()> {
    let Some(expected) = &descriptor.checksum else {
        return Ok(());
    };
    if !request.options.verify_checksum {
        debug!("Checksum verification disabled");
        return Ok(());
    }

    let actual = hash::hash_directory(staging.payload())
        .map_err(|e| error::fs::staging_failed(staging.payload(), e))?;
    if !hash::verify_hash(expected, &actual) {
        return Err(error::fs::checksum_mismatch(expected.as_str(), actual));
    }

    debug!(checksum = %actual, "Staged payload verified");
    Ok(())
}
