//! Common test utilities for Updraft integration tests

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use updraft::hash;
use updraft::package::archive;
use updraft::package::bundle::{BundleManifest, MANIFEST_FILE};

/// Bundle identifier every fixture package is built for
pub const BUNDLE_ID: &str = "org.example.app";

/// A temp directory holding an install location and packages
pub struct TestEnv {
    /// Temporary directory
    #[allow(dead_code)]
    pub temp: TempDir,
    /// Root of the temp directory
    pub path: PathBuf,
}

impl TestEnv {
    /// Create a new test environment
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let path = temp.path().to_path_buf();
        Self { temp, path }
    }

    /// Install location used by the tests
    pub fn target(&self) -> PathBuf {
        self.path.join("Example")
    }

    /// Write files under a directory of the environment
    pub fn write_tree(&self, dir: &str, files: &[(&str, &str)]) -> PathBuf {
        let root = self.path.join(dir);
        std::fs::create_dir_all(&root).expect("Failed to create directory");
        for (path, content) in files {
            let file_path = root.join(path);
            if let Some(parent) = file_path.parent() {
                std::fs::create_dir_all(parent).expect("Failed to create parent directory");
            }
            std::fs::write(&file_path, content).expect("Failed to write file");
        }
        root
    }

    /// Put an installed application at the target
    pub fn install_app(&self, files: &[(&str, &str)]) -> PathBuf {
        self.write_tree("Example", files)
    }

    /// Create a bundle package with a checksummed manifest
    #[allow(dead_code)]
    pub fn create_bundle(&self, version: &str, files: &[(&str, &str)]) -> PathBuf {
        let package = self.path.join(format!("packages/bundle-{version}"));
        let payload = self.write_tree(&format!("packages/bundle-{version}/payload"), files);

        let manifest = BundleManifest {
            version: version.to_string(),
            bundle_identifier: Some(BUNDLE_ID.to_string()),
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

    /// Create an archive package
    #[allow(dead_code)]
    pub fn create_archive(&self, version: &str, files: &[(&str, &str)]) -> PathBuf {
        let source = self.write_tree(&format!("build-{version}"), files);
        let output = self.path.join(format!("packages/example-{version}.updraft"));
        std::fs::create_dir_all(self.path.join("packages"))
            .expect("Failed to create packages directory");
        archive::pack(&source, version, Some(BUNDLE_ID), &output).expect("Failed to pack archive");
        output
    }

    /// Read a file from the environment
    #[allow(dead_code)]
    pub fn read_file(&self, path: &str) -> String {
        std::fs::read_to_string(self.path.join(path)).expect("Failed to read file")
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Digest of a directory tree, for before/after comparisons
pub fn digest(path: &Path) -> String {
    hash::hash_directory(path).expect("Failed to hash directory")
}

/// Staging directories of `target` still on disk
#[allow(dead_code)]
pub fn leftover_staging(target: &Path) -> Vec<PathBuf> {
    let name = target
        .file_name()
        .expect("target has a name")
        .to_string_lossy()
        .into_owned();
    let prefix = format!(".{name}.updraft-staging-");

    std::fs::read_dir(target.parent().expect("target has a parent"))
        .expect("Failed to read parent directory")
        .map(|entry| entry.expect("Failed to read entry").path())
        .filter(|path| {
            path.file_name()
                .is_some_and(|n| n.to_string_lossy().starts_with(&prefix))
        })
        .collect()
}
