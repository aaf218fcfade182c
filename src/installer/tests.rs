//! Engine tests
//!
//! Failures are injected through [`InstallIo`] fakes so every test runs on a
//! real temp directory.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use super::*;
use crate::error::{ErrorKind, PackageIssue};
use crate::package::archive;
use crate::test_fixtures::{write_archive_document, write_bundle, write_payload};
use crate::transaction::{CommitJournal, recover};
use crate::version::{StandardVersionComparator, VersionRejection};

/// Fails every copy or write after the first `allowed`
#[derive(Debug)]
struct DiskFullIo {
    allowed: usize,
    writes: AtomicUsize,
}

impl DiskFullIo {
    fn after(allowed: usize) -> Arc<Self> {
        Arc::new(Self {
            allowed,
            writes: AtomicUsize::new(0),
        })
    }

    fn next(&self) -> io::Result<()> {
        if self.writes.fetch_add(1, Ordering::SeqCst) >= self.allowed {
            return Err(io::Error::other("No space left on device"));
        }
        Ok(())
    }
}

impl InstallIo for DiskFullIo {
    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64> {
        self.next()?;
        std::fs::copy(from, to)
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        self.next()?;
        std::fs::write(path, contents)
    }
}

/// Cancels the request after `after` files were copied
#[derive(Debug)]
struct CancellingIo {
    after: usize,
    copies: AtomicUsize,
    cancel: CancellationToken,
}

impl InstallIo for CancellingIo {
    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64> {
        if self.copies.fetch_add(1, Ordering::SeqCst) + 1 >= self.after {
            self.cancel.cancel();
        }
        std::fs::copy(from, to)
    }
}

/// Fails the renames whose 1-based sequence numbers are listed
#[derive(Debug)]
struct FailingRenameIo {
    failing: Vec<usize>,
    renames: AtomicUsize,
}

impl FailingRenameIo {
    fn failing(failing: &[usize]) -> Arc<Self> {
        Arc::new(Self {
            failing: failing.to_vec(),
            renames: AtomicUsize::new(0),
        })
    }
}

impl InstallIo for FailingRenameIo {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let n = self.renames.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing.contains(&n) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("rename #{n} refused"),
            ));
        }
        std::fs::rename(from, to)
    }
}

/// An installed application at `<temp>/Example`
fn installed_app(temp: &TempDir) -> PathBuf {
    write_payload(
        &temp.path().join("Example"),
        &[("bin/app", "version 1.0.0"), ("share/readme", "old docs")],
    )
}

fn request(target: &Path, package: &Path, installed: &str) -> InstallRequest {
    InstallRequest::new(
        target,
        package,
        HostContext::new(installed, target, "org.example.app"),
        StandardVersionComparator,
    )
}

fn digest(path: &Path) -> String {
    hash::hash_directory(path).unwrap()
}

/// Staging directories of `target` still on disk
fn leftover_staging(target: &Path) -> Vec<PathBuf> {
    let prefix = transaction::staging_prefix(target).unwrap();
    std::fs::read_dir(target.parent().unwrap())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| {
            path.file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with(&prefix))
        })
        .collect()
}

fn three_file_bundle(temp: &TempDir, version: &str) -> PathBuf {
    write_bundle(
        temp.path(),
        version,
        &[
            ("bin/app", "version 1.2.0"),
            ("lib/core", "core library"),
            ("share/readme", "new docs"),
        ],
    )
}

#[test]
fn test_upgrade_installs_candidate_payload() {
    let temp = TempDir::new().unwrap();
    let target = installed_app(&temp);
    let package = three_file_bundle(&temp, "1.2.0");

    let summary = run(request(&target, &package, "1.0.0")).unwrap();

    assert_eq!(summary.previous_version, "1.0.0");
    assert_eq!(summary.installed_version, "1.2.0");
    assert_eq!(summary.kind, InstallerKind::Bundle);
    assert_eq!(digest(&target), digest(&package.join("payload")));
    assert!(leftover_staging(&target).is_empty());
    assert_eq!(CommitJournal::load(&target).unwrap(), None);
    assert_eq!(
        InstallReceipt::load(&target).unwrap().map(|r| r.version),
        Some("1.2.0".to_string())
    );
}

#[test]
fn test_downgrade_rejected_leaves_target_unchanged() {
    let temp = TempDir::new().unwrap();
    let target = installed_app(&temp);
    let before = digest(&target);
    let package = three_file_bundle(&temp, "1.9.0");

    let err = run(request(&target, &package, "2.0.0")).unwrap_err();

    assert!(matches!(
        err,
        InstallError::VersionRejected {
            reason: VersionRejection::DowngradeRejected,
            ..
        }
    ));
    assert_eq!(digest(&target), before);
    assert!(leftover_staging(&target).is_empty());
}

#[test]
fn test_identical_version_rejected_unless_forced() {
    let temp = TempDir::new().unwrap();
    let target = installed_app(&temp);
    let package = three_file_bundle(&temp, "1.0.0");

    let err = run(request(&target, &package, "1.0.0")).unwrap_err();
    assert!(matches!(
        err,
        InstallError::VersionRejected {
            reason: VersionRejection::IdenticalVersionRejected,
            ..
        }
    ));

    let forced = request(&target, &package, "1.0.0").with_options(InstallOptions {
        force_reinstall: true,
        ..InstallOptions::default()
    });
    assert!(run(forced).is_ok());
    assert_eq!(digest(&target), digest(&package.join("payload")));
}

#[test]
fn test_downgrade_allowed_with_override() {
    let temp = TempDir::new().unwrap();
    let target = installed_app(&temp);
    let package = three_file_bundle(&temp, "1.9.0");

    let options = InstallOptions {
        allow_downgrade: true,
        ..InstallOptions::default()
    };
    let summary = run(request(&target, &package, "2.0.0").with_options(options)).unwrap();

    assert_eq!(summary.installed_version, "1.9.0");
}

#[test]
fn test_repeated_request_is_gated_by_receipt() {
    let temp = TempDir::new().unwrap();
    let target = installed_app(&temp);
    let package = three_file_bundle(&temp, "1.2.0");

    run(request(&target, &package, "1.0.0")).unwrap();
    let after_first = digest(&target);

    // Same request, same stale host snapshot
    let err = run(request(&target, &package, "1.0.0")).unwrap_err();

    assert!(matches!(
        err,
        InstallError::VersionRejected {
            reason: VersionRejection::IdenticalVersionRejected,
            ..
        }
    ));
    assert_eq!(digest(&target), after_first);
}

#[test]
fn test_receipt_for_other_application_is_ignored() {
    let temp = TempDir::new().unwrap();
    let target = installed_app(&temp);
    InstallReceipt {
        bundle_identifier: "org.other.app".to_string(),
        version: "9.0".to_string(),
        checksum: None,
    }
    .store(&target)
    .unwrap();
    let package = three_file_bundle(&temp, "1.2.0");

    assert!(run(request(&target, &package, "1.0.0")).is_ok());
}

#[test]
fn test_fresh_install_creates_target() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("Applications/Example");
    let package = three_file_bundle(&temp, "1.2.0");

    let summary = run(request(&target, &package, "0")).unwrap();

    assert_eq!(summary.installed_version, "1.2.0");
    assert_eq!(digest(&target), digest(&package.join("payload")));
    assert!(leftover_staging(&target).is_empty());
}

#[test]
fn test_archive_upgrade() {
    let temp = TempDir::new().unwrap();
    let target = installed_app(&temp);
    let source = write_payload(
        &temp.path().join("build"),
        &[("bin/app", "version 2.0"), ("share/readme", "docs 2")],
    );
    let package = temp.path().join("example-2.0.updraft");
    archive::pack(&source, "2.0", Some("org.example.app"), &package).unwrap();

    let summary = run(request(&target, &package, "1.0.0")).unwrap();

    assert_eq!(summary.kind, InstallerKind::Archive);
    assert_eq!(digest(&target), digest(&source));
}

#[test]
fn test_missing_manifest_is_invalid_package() {
    let temp = TempDir::new().unwrap();
    let target = installed_app(&temp);
    let before = digest(&target);
    let package = write_payload(&temp.path().join("not-a-bundle"), &[("bin/app", "x")]);

    let err = run(request(&target, &package, "1.0.0")).unwrap_err();

    assert!(matches!(
        err,
        InstallError::InvalidPackage {
            reason: PackageIssue::Malformed,
            ..
        }
    ));
    assert_eq!(digest(&target), before);
    assert!(leftover_staging(&target).is_empty());
}

#[test]
fn test_truncated_archive_is_invalid_package() {
    let temp = TempDir::new().unwrap();
    let target = installed_app(&temp);
    let source = write_payload(&temp.path().join("build"), &[("bin/app", "version 2.0")]);
    let package = temp.path().join("example-2.0.updraft");
    archive::pack(&source, "2.0", None, &package).unwrap();
    let bytes = std::fs::read(&package).unwrap();
    std::fs::write(&package, &bytes[..bytes.len() / 2]).unwrap();

    let err = run(request(&target, &package, "1.0.0")).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidPackage);
    assert!(leftover_staging(&target).is_empty());
}

#[test]
fn test_archive_with_file_and_nested_entry_is_invalid_package() {
    let temp = TempDir::new().unwrap();
    let target = installed_app(&temp);
    let before = digest(&target);
    let package = temp.path().join("example-2.0.updraft");
    write_archive_document(
        &package,
        &archive::ArchiveDocument {
            manifest: archive::ArchiveManifest {
                version: "2.0".to_string(),
                bundle_identifier: None,
                checksum: None,
            },
            files: vec![
                archive::ArchiveEntry {
                    path: "a".to_string(),
                    contents: hex::encode("file"),
                    executable: false,
                },
                archive::ArchiveEntry {
                    path: "a/b".to_string(),
                    contents: hex::encode("nested"),
                    executable: false,
                },
            ],
        },
    );

    let err = run(request(&target, &package, "1.0.0")).unwrap_err();

    assert!(matches!(
        err,
        InstallError::InvalidPackage {
            reason: PackageIssue::Malformed,
            ..
        }
    ));
    assert!(!err.kind().is_retriable());
    assert_eq!(digest(&target), before);
    assert!(leftover_staging(&target).is_empty());
}

#[test]
fn test_missing_package_is_invalid_package() {
    let temp = TempDir::new().unwrap();
    let target = installed_app(&temp);

    let err = run(request(&target, &temp.path().join("nope.updraft"), "1.0.0")).unwrap_err();

    assert!(matches!(
        err,
        InstallError::InvalidPackage {
            reason: PackageIssue::NotFound,
            ..
        }
    ));
}

#[test]
fn test_unknown_file_is_unsupported_format() {
    let temp = TempDir::new().unwrap();
    let target = installed_app(&temp);
    let package = temp.path().join("update.txt");
    std::fs::write(&package, "plain text").unwrap();

    let err = run(request(&target, &package, "1.0.0")).unwrap_err();

    assert!(matches!(
        err,
        InstallError::InvalidPackage {
            reason: PackageIssue::UnsupportedFormat,
            ..
        }
    ));
}

#[test]
fn test_identifier_mismatch() {
    let temp = TempDir::new().unwrap();
    let target = installed_app(&temp);
    let package = three_file_bundle(&temp, "1.2.0");
    let mut host = HostContext::new("1.0.0", &target, "org.other.app");
    host.running_process_id = Some(4242);

    let request = InstallRequest::new(&target, &package, host, StandardVersionComparator);
    let err = run(request).unwrap_err();

    assert!(matches!(
        err,
        InstallError::InvalidPackage {
            reason: PackageIssue::IdentifierMismatch,
            ..
        }
    ));
}

#[test]
fn test_missing_checksum_when_required() {
    let temp = TempDir::new().unwrap();
    let target = installed_app(&temp);
    let package = three_file_bundle(&temp, "1.2.0");
    std::fs::write(package.join("package.yaml"), "version: 1.2.0\n").unwrap();

    assert!(run(request(&target, &package, "1.0.0")).is_ok());

    let target = temp.path().join("Second");
    let strict = request(&target, &package, "1.0.0").with_options(InstallOptions {
        require_checksum: true,
        ..InstallOptions::default()
    });
    let err = run(strict).unwrap_err();
    assert!(matches!(
        err,
        InstallError::InvalidPackage {
            reason: PackageIssue::MissingChecksum,
            ..
        }
    ));
}

#[test]
fn test_checksum_mismatch_fails_staging() {
    let temp = TempDir::new().unwrap();
    let target = installed_app(&temp);
    let before = digest(&target);
    let package = three_file_bundle(&temp, "1.2.0");
    std::fs::write(package.join("payload/bin/app"), "tampered").unwrap();

    let err = run(request(&target, &package, "1.0.0")).unwrap_err();

    assert!(matches!(err, InstallError::ChecksumMismatch { .. }));
    assert_eq!(err.kind(), ErrorKind::StagingFailed);
    assert_eq!(digest(&target), before);
    assert!(leftover_staging(&target).is_empty());

    let unverified = request(&target, &package, "1.0.0").with_options(InstallOptions {
        verify_checksum: false,
        ..InstallOptions::default()
    });
    assert!(run(unverified).is_ok());
}

#[cfg(unix)]
#[test]
fn test_symlink_added_after_checksum_fails_staging() {
    let temp = TempDir::new().unwrap();
    let target = installed_app(&temp);
    let before = digest(&target);
    let package = three_file_bundle(&temp, "1.2.0");
    std::os::unix::fs::symlink("app", package.join("payload/bin/alias")).unwrap();

    let err = run(request(&target, &package, "1.0.0")).unwrap_err();

    assert!(matches!(err, InstallError::ChecksumMismatch { .. }));
    assert_eq!(digest(&target), before);
    assert!(std::fs::symlink_metadata(target.join("bin/alias")).is_err());
    assert!(leftover_staging(&target).is_empty());
}

#[test]
fn test_disk_full_during_staging() {
    let temp = TempDir::new().unwrap();
    let target = installed_app(&temp);
    let before = digest(&target);
    let package = three_file_bundle(&temp, "1.2.0");

    let err = run(request(&target, &package, "1.0.0").with_io(DiskFullIo::after(1))).unwrap_err();

    assert!(matches!(err, InstallError::StagingFailed { .. }));
    assert!(err.kind().is_retriable());
    assert_eq!(digest(&target), before);
    assert!(leftover_staging(&target).is_empty());
    assert_eq!(InstallReceipt::load(&target).unwrap(), None);
}

#[test]
fn test_cancel_during_staging() {
    let temp = TempDir::new().unwrap();
    let target = installed_app(&temp);
    let before = digest(&target);
    let package = three_file_bundle(&temp, "1.2.0");

    let request = request(&target, &package, "1.0.0");
    let io = Arc::new(CancellingIo {
        after: 1,
        copies: AtomicUsize::new(0),
        cancel: request.cancellation_token(),
    });
    let err = run(request.with_io(io)).unwrap_err();

    assert!(matches!(err, InstallError::Cancelled));
    assert_eq!(digest(&target), before);
    assert!(leftover_staging(&target).is_empty());
}

#[test]
fn test_cancel_before_start() {
    let temp = TempDir::new().unwrap();
    let target = installed_app(&temp);
    let package = three_file_bundle(&temp, "1.2.0");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = run(request(&target, &package, "1.0.0").with_cancellation(cancel)).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[test]
fn test_commit_failure_restores_previous_install() {
    let temp = TempDir::new().unwrap();
    let target = installed_app(&temp);
    let before = digest(&target);
    let package = three_file_bundle(&temp, "1.2.0");

    // Rename #2 moves the payload into place
    let io = FailingRenameIo::failing(&[2]);
    let err = run(request(&target, &package, "1.0.0").with_io(io)).unwrap_err();

    assert!(matches!(err, InstallError::CommitFailed { .. }));
    assert!(err.kind().is_retriable());
    assert_eq!(digest(&target), before);
    assert!(leftover_staging(&target).is_empty());
    assert_eq!(CommitJournal::load(&target).unwrap(), None);
    assert_eq!(InstallReceipt::load(&target).unwrap(), None);
}

#[test]
fn test_failed_backup_rename_changes_nothing() {
    let temp = TempDir::new().unwrap();
    let target = installed_app(&temp);
    let before = digest(&target);
    let package = three_file_bundle(&temp, "1.2.0");

    let io = FailingRenameIo::failing(&[1]);
    let err = run(request(&target, &package, "1.0.0").with_io(io)).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CommitFailed);
    assert_eq!(digest(&target), before);
}

#[test]
fn test_failed_rollback_is_unrecoverable_until_recovered() {
    let temp = TempDir::new().unwrap();
    let target = installed_app(&temp);
    let before = digest(&target);
    let package = three_file_bundle(&temp, "1.2.0");

    // Payload rename fails, and so does putting the backup back
    let io = FailingRenameIo::failing(&[2, 3]);
    let err = run(request(&target, &package, "1.0.0").with_io(io)).unwrap_err();

    assert!(matches!(err, InstallError::UnrecoverableState { .. }));
    assert!(err.kind().is_fatal());
    assert!(!target.exists());
    assert!(CommitJournal::load(&target).unwrap().is_some());
    assert_eq!(leftover_staging(&target).len(), 1);

    let report = recover(&target).unwrap();

    assert!(report.rolled_back);
    assert_eq!(digest(&target), before);
    assert!(leftover_staging(&target).is_empty());
}

#[test]
fn test_install_sweeps_orphaned_staging() {
    let temp = TempDir::new().unwrap();
    let target = installed_app(&temp);
    let orphan = temp.path().join(".Example.updraft-staging-dead");
    write_payload(&orphan.join("payload"), &[("bin/app", "half copied")]);
    let package = three_file_bundle(&temp, "1.2.0");

    run(request(&target, &package, "1.0.0")).unwrap();

    assert!(!orphan.exists());
}

#[test]
fn test_observer_sees_every_state_in_order() {
    let temp = TempDir::new().unwrap();
    let target = installed_app(&temp);
    let package = three_file_bundle(&temp, "1.2.0");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);

    run(request(&target, &package, "1.0.0")
        .with_observer(move |state| recorder.lock().unwrap().push(state)))
    .unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            InstallState::Idle,
            InstallState::Inspecting,
            InstallState::Gating,
            InstallState::Staging,
            InstallState::Committing,
            InstallState::Completed,
        ]
    );
}

#[test]
fn test_observer_on_rejection_ends_completed() {
    let temp = TempDir::new().unwrap();
    let target = installed_app(&temp);
    let package = three_file_bundle(&temp, "0.9.0");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);

    let _ = run(request(&target, &package, "1.0.0")
        .with_observer(move |state| recorder.lock().unwrap().push(state)));

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            InstallState::Idle,
            InstallState::Inspecting,
            InstallState::Gating,
            InstallState::Completed,
        ]
    );
}

#[test]
fn test_invalid_requests() {
    let temp = TempDir::new().unwrap();
    let target = installed_app(&temp);
    let package = three_file_bundle(&temp, "1.2.0");

    let relative = request(Path::new("Example"), &package, "1.0.0");
    assert_eq!(run(relative).unwrap_err().kind(), ErrorKind::InvalidRequest);

    let relative_package = request(&target, Path::new("bundle-1.2.0"), "1.0.0");
    assert_eq!(
        run(relative_package).unwrap_err().kind(),
        ErrorKind::InvalidRequest
    );

    let no_version = request(&target, &package, "  ");
    assert_eq!(run(no_version).unwrap_err().kind(), ErrorKind::InvalidRequest);

    let inside = write_bundle(&target, "1.2.0", &[("bin/app", "x")]);
    let nested = request(&target, &inside, "1.0.0");
    assert_eq!(run(nested).unwrap_err().kind(), ErrorKind::InvalidRequest);

    let self_overwrite =
        request(&target, &package, "1.0.0").with_installer_executable(target.join("bin/app"));
    assert_eq!(
        run(self_overwrite).unwrap_err().kind(),
        ErrorKind::InvalidRequest
    );

    let file_target = temp.path().join("file");
    std::fs::write(&file_target, "not a directory").unwrap();
    assert_eq!(
        run(request(&file_target, &package, "1.0.0")).unwrap_err().kind(),
        ErrorKind::InvalidRequest
    );
}

#[test]
fn test_package_path_with_parent_components() {
    let temp = TempDir::new().unwrap();
    let target = installed_app(&temp);
    three_file_bundle(&temp, "1.2.0");

    // <temp>/Example/../bundle-1.2.0 is a sibling of the target
    let beside = target.join("..").join("bundle-1.2.0");
    let summary = run(request(&target, &beside, "1.0.0")).unwrap();
    assert_eq!(summary.installed_version, "1.2.0");

    // <temp>/elsewhere/../Example/... is inside it
    write_bundle(&target, "1.3.0", &[("bin/app", "x")]);
    let inside = temp
        .path()
        .join("elsewhere/../Example/./bundle-1.3.0");
    assert_eq!(
        run(request(&target, &inside, "1.2.0")).unwrap_err().kind(),
        ErrorKind::InvalidRequest
    );
}

#[test]
fn test_custom_comparator() {
    let temp = TempDir::new().unwrap();
    let target = installed_app(&temp);
    let package = three_file_bundle(&temp, "build-7");

    // Plain string ordering: "build-7" > "build-10"
    let request = InstallRequest::new(
        &target,
        &package,
        HostContext::new("build-10", &target, "org.example.app"),
        |a: &str, b: &str| a.cmp(b),
    );

    assert!(run(request).is_ok());
}
