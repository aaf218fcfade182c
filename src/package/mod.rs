//! Package inspection
//!
//! Two package formats are recognised:
//! - a **bundle**: a directory with a `package.yaml` manifest and a payload
//!   directory (see [`bundle`])
//! - an **archive**: a gzip-compressed JSON document carrying the manifest and
//!   every payload file (see [`archive`])
//!
//! Inspection is read-only and can be repeated on the same path.

pub mod archive;
pub mod bundle;

use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::error::Result;
use crate::installer::InstallerKind;

/// What an inspected package declares
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageDescriptor {
    /// Version the package installs
    pub declared_version: String,

    /// Payload location: the payload directory of a bundle, the archive file itself
    pub payload_path: PathBuf,

    pub kind: InstallerKind,

    /// Identifier of the application the package is for, if declared
    pub bundle_identifier: Option<String>,

    /// `blake3:` digest of the payload tree, if declared
    pub checksum: Option<String>,

    /// Number of regular files in the payload
    pub file_count: usize,
}

/// Inspect the package at `path`
pub fn inspect(path: &Path) -> Result<PackageDescriptor> {
    InstallerKind::detect(path)?.inspect(path)
}

/// Validate a payload-relative path from a manifest
///
/// Only plain relative components are accepted; absolute paths, `..`, and
/// empty paths would let a package write outside its payload.
pub(crate) fn safe_relative_path(raw: &str) -> Option<PathBuf> {
    let path = Path::new(raw);
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (!clean.as_os_str().is_empty()).then_some(clean)
}

/// Trimmed, non-empty version string from a manifest
pub(crate) fn clean_version(raw: &str) -> Option<String> {
    let version = raw.trim();
    (!version.is_empty() && !version.chars().any(char::is_whitespace)).then(|| version.to_string())
}
