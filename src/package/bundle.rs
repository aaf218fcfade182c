//! Bundle packages: a directory with a `package.yaml` manifest
//!
//! ```yaml
//! version: "1.2.0"
//! bundle_identifier: org.example.app
//! payload: payload
//! checksum: "blake3:…"
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use super::PackageDescriptor;
use crate::cancel::CancellationToken;
use crate::error::{self, Result};
use crate::installer::InstallerKind;
use crate::installer::file_ops::InstallIo;
use crate::installer::staging::StagingArea;

/// Manifest file name at the root of a bundle package
pub const MANIFEST_FILE: &str = "package.yaml";

fn default_payload() -> String {
    "payload".to_string()
}

/// Bundle manifest (package.yaml)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BundleManifest {
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_identifier: Option<String>,

    /// Payload directory, relative to the package root
    #[serde(default = "default_payload")]
    pub payload: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl BundleManifest {
    /// Parse a bundle manifest from YAML string
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize the manifest to YAML string
    pub fn to_yaml(&self) -> std::result::Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Read and validate a bundle package
pub fn inspect(path: &Path) -> Result<PackageDescriptor> {
    let manifest_path = path.join(MANIFEST_FILE);
    let yaml = fs::read_to_string(&manifest_path).map_err(|e| {
        error::package::malformed(path, format!("cannot read {MANIFEST_FILE}: {e}"))
    })?;

    let manifest = BundleManifest::from_yaml(&yaml)
        .map_err(|e| error::package::malformed(path, format!("invalid {MANIFEST_FILE}: {e}")))?;

    let declared_version = super::clean_version(&manifest.version)
        .ok_or_else(|| error::package::malformed(path, "manifest declares no usable version"))?;

    let relative = super::safe_relative_path(&manifest.payload).ok_or_else(|| {
        error::package::malformed(
            path,
            format!("payload '{}' is outside the package", manifest.payload),
        )
    })?;
    let payload_path = path.join(relative);

    // symlink_metadata so a payload symlinked elsewhere is not followed
    let is_dir = fs::symlink_metadata(&payload_path)
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if !is_dir {
        return Err(error::package::malformed(
            path,
            format!("payload directory {} is missing", payload_path.display()),
        ));
    }

    let mut file_count = 0;
    for entry in WalkDir::new(&payload_path) {
        let entry = entry.map_err(|e| error::package::malformed(path, e.to_string()))?;
        if entry.file_type().is_file() {
            file_count += 1;
        }
    }

    Ok(PackageDescriptor {
        declared_version,
        payload_path,
        kind: InstallerKind::Bundle,
        bundle_identifier: manifest.bundle_identifier,
        checksum: manifest.checksum,
        file_count,
    })
}

/// Copy the payload tree into the staging area
pub fn stage(
    descriptor: &PackageDescriptor,
    staging: &StagingArea,
    io: &dyn InstallIo,
    cancel: &CancellationToken,
) -> Result<()> {
    let source = &descriptor.payload_path;

    for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
        cancel.check()?;

        let entry = entry.map_err(|e| error::fs::staging_failed(source, e))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| error::fs::staging_failed(entry.path(), e))?;
        let dest = staging.payload().join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            io.create_dir_all(&dest)
                .map_err(|e| error::fs::staging_failed(&dest, e))?;
        } else if file_type.is_symlink() {
            let link_target =
                fs::read_link(entry.path()).map_err(|e| error::fs::staging_failed(entry.path(), e))?;
            io.symlink(&link_target, &dest)
                .map_err(|e| error::fs::staging_failed(&dest, e))?;
        } else {
            io.copy_file(entry.path(), &dest)
                .map_err(|e| error::fs::staging_failed(&dest, e))?;
        }

        debug!(path = %relative.display(), "Staged");
    }

    Ok(())
}
