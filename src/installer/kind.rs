//! Installer kinds
//!
//! The set of package formats is closed: each [`InstallerKind`] knows how to
//! inspect and stage its own format, and all kinds share the same commit and
//! rollback because staging always produces a plain directory tree.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use tracing::{error, info, warn};

use super::file_ops::InstallIo;
use super::staging::StagingArea;
use crate::cancel::CancellationToken;
use crate::error::{self, Result};
use crate::package::{self, PackageDescriptor};
use crate::transaction::{CommitJournal, InstallReceipt, SwapTransaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallerKind {
    /// Directory with a `package.yaml` manifest
    Bundle,
    /// gzip-compressed JSON archive
    Archive,
}

impl std::fmt::Display for InstallerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstallerKind::Bundle => f.write_str("bundle"),
            InstallerKind::Archive => f.write_str("archive"),
        }
    }
}

impl InstallerKind {
    /// Work out which kind of package lives at `path`
    pub fn detect(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| error::package::not_found(path, e.to_string()))?;

        if metadata.is_dir() {
            if path.join(package::bundle::MANIFEST_FILE).is_file() {
                return Ok(InstallerKind::Bundle);
            }
            return Err(error::package::malformed(
                path,
                format!("directory has no {}", package::bundle::MANIFEST_FILE),
            ));
        }

        let mut magic = [0u8; 2];
        let read = File::open(path)
            .and_then(|mut file| file.read(&mut magic))
            .map_err(|e| error::package::not_found(path, e.to_string()))?;
        if read == magic.len() && magic == package::archive::GZIP_MAGIC {
            return Ok(InstallerKind::Archive);
        }

        let has_archive_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| package::archive::ARCHIVE_EXTENSIONS.contains(&ext));
        if has_archive_extension {
            Err(error::package::malformed(
                path,
                "archive is truncated or not gzip-compressed",
            ))
        } else {
            Err(error::package::unsupported_format(
                path,
                "not a bundle directory or archive package",
            ))
        }
    }

    /// Read the package metadata without touching anything
    pub fn inspect(self, path: &Path) -> Result<PackageDescriptor> {
        match self {
            InstallerKind::Bundle => package::bundle::inspect(path),
            InstallerKind::Archive => package::archive::inspect(path),
        }
    }

    /// Materialise the payload in the staging area
    pub fn stage(
        self,
        descriptor: &PackageDescriptor,
        staging: &StagingArea,
        io: &dyn InstallIo,
        cancel: &CancellationToken,
    ) -> Result<()> {
        match self {
            InstallerKind::Bundle => package::bundle::stage(descriptor, staging, io, cancel),
            InstallerKind::Archive => package::archive::stage(descriptor, staging, io, cancel),
        }
    }

    /// Swap the staged payload into `target`
    ///
    /// Not cancellable. On failure the previous install is put back; if that
    /// is impossible the staging area, backup and journal are left on disk and
    /// [`error::InstallError::UnrecoverableState`] is returned.
    pub fn commit(
        self,
        staging: StagingArea,
        target: &Path,
        receipt: &InstallReceipt,
        io: &dyn InstallIo,
    ) -> Result<()> {
        let journal = CommitJournal {
            target: target.to_path_buf(),
            staging_root: staging.root().to_path_buf(),
            candidate_version: receipt.version.clone(),
            bundle_identifier: receipt.bundle_identifier.clone(),
            checksum: receipt.checksum.clone(),
        };
        journal
            .store()
            .map_err(|e| error::fs::commit_failed(target, format!("writing journal: {e}")))?;

        let backup = staging.backup();
        let mut swap = SwapTransaction::new(target, staging.payload(), &backup, io);

        let swapped = swap.backup_target().and_then(|()| swap.install_payload());
        if let Err(commit_error) = swapped {
            return match self.rollback(&mut swap) {
                Ok(()) => {
                    drop(swap);
                    clear_journal(target);
                    Err(error::fs::commit_failed(target, commit_error))
                }
                Err(rollback_error) => {
                    let parked = swap.backup().map(Path::to_path_buf);
                    swap.abandon();
                    let root = staging.keep();
                    error!(
                        path = %target.display(),
                        staging = %root.display(),
                        %commit_error,
                        %rollback_error,
                        "Commit and rollback both failed"
                    );
                    Err(error::fs::unrecoverable(
                        target,
                        format!("commit failed ({commit_error}) and rollback failed ({rollback_error})"),
                        parked.as_deref(),
                    ))
                }
            };
        }
        swap.commit();
        info!(path = %target.display(), version = %receipt.version, "Payload is live");

        if let Err(e) = receipt.store(target) {
            warn!(path = %target.display(), error = %e, "Could not write install receipt");
        }
        clear_journal(target);
        // Dropping the staging area removes the parked previous install
        drop(staging);

        Ok(())
    }

    /// Undo a partially applied swap
    pub fn rollback(self, swap: &mut SwapTransaction<'_>) -> std::io::Result<()> {
        warn!(kind = %self, "Rolling back commit");
        swap.rollback()
    }
}

fn clear_journal(target: &Path) {
    if let Err(e) = CommitJournal::clear(target) {
        warn!(path = %target.display(), error = %e, "Could not remove commit journal");
    }
}
