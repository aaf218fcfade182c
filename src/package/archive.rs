//! Archive packages: one gzip file holding a JSON document
//!
//! ```json
//! {
//!   "manifest": { "version": "1.2.0", "bundle_identifier": "org.example.app", "checksum": "blake3:…" },
//!   "files": [ { "path": "bin/app", "contents": "<hex>", "executable": true } ]
//! }
//! ```

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::PackageDescriptor;
use crate::cancel::CancellationToken;
use crate::error::{self, Result};
use crate::hash;
use crate::installer::InstallerKind;
use crate::installer::file_ops::InstallIo;
use crate::installer::staging::StagingArea;

/// gzip magic bytes
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// File extensions archive packages are published with
pub const ARCHIVE_EXTENSIONS: &[&str] = &["gz", "updraft"];

/// Manifest embedded in an archive
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ArchiveManifest {
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_identifier: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// One payload file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ArchiveEntry {
    /// Payload-relative path, `/`-separated
    pub path: String,

    /// File contents, hex encoded
    pub contents: String,

    #[serde(default)]
    pub executable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchiveDocument {
    pub manifest: ArchiveManifest,
    pub files: Vec<ArchiveEntry>,
}

fn read_document(path: &Path) -> Result<ArchiveDocument> {
    let file = File::open(path).map_err(|e| error::package::not_found(path, e.to_string()))?;
    let decoder = GzDecoder::new(BufReader::new(file));

    // Truncation surfaces here as an unexpected end of the gzip stream
    serde_json::from_reader(decoder)
        .map_err(|e| error::package::malformed(path, format!("cannot decode archive: {e}")))
}

fn is_hex(contents: &str) -> bool {
    contents.len() % 2 == 0 && contents.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Read and validate an archive package
pub fn inspect(path: &Path) -> Result<PackageDescriptor> {
    let document = read_document(path)?;

    let declared_version = super::clean_version(&document.manifest.version)
        .ok_or_else(|| error::package::malformed(path, "manifest declares no usable version"))?;

    let mut seen = HashSet::new();
    for entry in &document.files {
        let relative = super::safe_relative_path(&entry.path).ok_or_else(|| {
            error::package::malformed(path, format!("entry '{}' is outside the payload", entry.path))
        })?;
        if !seen.insert(relative) {
            return Err(error::package::malformed(
                path,
                format!("entry '{}' appears more than once", entry.path),
            ));
        }
        if !is_hex(&entry.contents) {
            return Err(error::package::malformed(
                path,
                format!("entry '{}' has corrupt contents", entry.path),
            ));
        }
    }

    // A file cannot also be a directory holding other entries
    if let Some(nested) = seen
        .iter()
        .find(|entry| entry.ancestors().skip(1).any(|parent| seen.contains(parent)))
    {
        return Err(error::package::malformed(
            path,
            format!("entry '{}' is nested under another file", nested.display()),
        ));
    }

    Ok(PackageDescriptor {
        declared_version,
        payload_path: path.to_path_buf(),
        kind: InstallerKind::Archive,
        bundle_identifier: document.manifest.bundle_identifier,
        checksum: document.manifest.checksum,
        file_count: document.files.len(),
    })
}

/// Extract every entry into the staging area
pub fn stage(
    descriptor: &PackageDescriptor,
    staging: &StagingArea,
    io: &dyn InstallIo,
    cancel: &CancellationToken,
) -> Result<()> {
    let archive = &descriptor.payload_path;
    let document = read_document(archive)
        .map_err(|e| error::fs::staging_failed(archive, format!("archive changed since inspection: {e}")))?;

    for entry in &document.files {
        cancel.check()?;

        let relative = super::safe_relative_path(&entry.path).ok_or_else(|| {
            error::fs::staging_failed(archive, format!("unsafe entry '{}'", entry.path))
        })?;
        let dest = staging.payload().join(&relative);

        let contents =
            hex::decode(&entry.contents).map_err(|e| error::fs::staging_failed(&dest, e))?;

        if let Some(parent) = dest.parent() {
            io.create_dir_all(parent)
                .map_err(|e| error::fs::staging_failed(parent, e))?;
        }
        io.write_file(&dest, &contents)
            .map_err(|e| error::fs::staging_failed(&dest, e))?;
        if entry.executable {
            io.set_executable(&dest)
                .map_err(|e| error::fs::staging_failed(&dest, e))?;
        }

        debug!(path = %relative.display(), bytes = contents.len(), "Extracted");
    }

    Ok(())
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    false
}

/// Build an archive package from a payload directory
///
/// The manifest checksum is computed from `source`, so installing the result
/// reproduces `source` exactly. The archive is written to a temporary file
/// beside `output` and renamed into place.
pub fn pack(
    source: &Path,
    version: &str,
    bundle_identifier: Option<&str>,
    output: &Path,
) -> Result<PackageDescriptor> {
    let version = super::clean_version(version)
        .ok_or_else(|| error::package::pack_failed(source, format!("invalid version '{version}'")))?;

    let mut files = Vec::new();
    for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| error::package::pack_failed(source, e))?;
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            return Err(error::package::pack_failed(
                entry.path(),
                "symbolic links cannot be stored in archive packages",
            ));
        }
        if !file_type.is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| error::package::pack_failed(entry.path(), e))?;
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let contents =
            std::fs::read(entry.path()).map_err(|e| error::package::pack_failed(entry.path(), e))?;
        let metadata = entry
            .metadata()
            .map_err(|e| error::package::pack_failed(entry.path(), e))?;

        files.push(ArchiveEntry {
            path,
            contents: hex::encode(contents),
            executable: is_executable(&metadata),
        });
    }

    let checksum = hash::hash_directory(source).map_err(|e| error::package::pack_failed(source, e))?;
    let document = ArchiveDocument {
        manifest: ArchiveManifest {
            version,
            bundle_identifier: bundle_identifier.map(str::to_string),
            checksum: Some(checksum),
        },
        files,
    };

    let parent = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let temp =
        tempfile::NamedTempFile::new_in(parent).map_err(|e| error::package::pack_failed(output, e))?;
    {
        let mut encoder = GzEncoder::new(BufWriter::new(temp.as_file()), Compression::default());
        serde_json::to_writer(&mut encoder, &document)
            .map_err(|e| error::package::pack_failed(output, e))?;
        encoder
            .finish()
            .and_then(|mut writer| writer.flush())
            .map_err(|e| error::package::pack_failed(output, e))?;
    }
    temp.persist(output)
        .map_err(|e| error::package::pack_failed(output, e.error))?;

    info!(
        path = %output.display(),
        files = document.files.len(),
        "Packed archive"
    );
    inspect(output)
}
