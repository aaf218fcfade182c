//! Test fixtures for building packages on disk.
//!
//! Engine tests need real packages: a payload tree, a bundle around it, or a
//! hand-crafted archive document (including invalid ones the packer would
//! refuse to write).
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_fixtures::{write_bundle, write_payload};
//!
//! #[test]
//! fn my_test() {
//!     let temp = TempDir::new().unwrap();
//!
//!     // A bare payload tree
//!     let payload = write_payload(&temp.path().join("build"), &[("bin/app", "v1")]);
//!
//!     // A bundle package for version 1.2.0
//!     let package = write_bundle(temp.path(), "1.2.0", &[("bin/app", "v1.2")]);
//! }
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::hash;
use crate::package::archive::ArchiveDocument;
use crate::package::bundle::{BundleManifest, MANIFEST_FILE};

/// Create `dir` and the given files inside it.
///
/// Takes a list of (path, content) tuples relative to `dir`.
///
/// # Panics
///
/// Panics if any file cannot be created.
pub fn write_payload(dir: &Path, files: &[(&str, &str)]) -> PathBuf {
    std::fs::create_dir_all(dir).expect("Failed to create payload directory");
    for (path, content) in files {
        let full_path = dir.join(path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&full_path, content).expect("Failed to write payload file");
    }
    dir.to_path_buf()
}

/// Create a bundle package `dir/bundle-<version>` for `org.example.app`.
///
/// The manifest carries the checksum of the payload, so the bundle installs
/// with checksum verification on.
///
/// # Panics
///
/// Panics if the bundle cannot be written.
pub fn write_bundle(dir: &Path, version: &str, files: &[(&str, &str)]) -> PathBuf {
    let package = dir.join(format!("bundle-{version}"));
    let payload = write_payload(&package.join("payload"), files);

    let manifest = BundleManifest {
        version: version.to_string(),
        bundle_identifier: Some("org.example.app".to_string()),
        payload: "payload".to_string(),
        checksum: Some(hash::hash_directory(&payload).expect("Failed to hash payload")),
    };
    std::fs::write(
        package.join(MANIFEST_FILE),
        manifest.to_yaml().expect("Failed to serialize manifest"),
    )
    .expect("Failed to write manifest");

    package
}

/// Write an archive package from a document, without validating it.
///
/// # Panics
///
/// Panics if the archive cannot be written.
pub fn write_archive_document(path: &Path, document: &ArchiveDocument) {
    let file = std::fs::File::create(path).expect("Failed to create archive");
    let mut encoder = GzEncoder::new(file, Compression::default());
    serde_json::to_writer(&mut encoder, document).expect("Failed to encode archive");
    encoder
        .finish()
        .and_then(|mut file| file.flush())
        .expect("Failed to finish archive");
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_payload() {
        let temp = TempDir::new().unwrap();
        let payload = write_payload(&temp.path().join("p"), &[("a/b/c", "deep")]);
        assert_eq!(std::fs::read_to_string(payload.join("a/b/c")).unwrap(), "deep");
    }

    #[test]
    fn test_write_bundle_layout() {
        let temp = TempDir::new().unwrap();
        let package = write_bundle(temp.path(), "3.0", &[("app", "x")]);

        assert_eq!(package, temp.path().join("bundle-3.0"));
        assert!(package.join(MANIFEST_FILE).is_file());
        assert!(package.join("payload/app").is_file());
    }
}
