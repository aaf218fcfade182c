//! Basic file operations for staging and committing
//!
//! Every mutation the engine performs goes through [`InstallIo`], which lets
//! tests inject failures (a full disk, a rename that cannot complete) at exact
//! points. [`OsIo`] is the real file system.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

/// File system mutations used by the engine
///
/// Each method defaults to the standard library operation.
pub trait InstallIo: Send + Sync + fmt::Debug {
    /// Create a directory and any missing parents
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    /// Copy a regular file, preserving permissions
    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64> {
        fs::copy(from, to)
    }

    /// Write a file from memory
    fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        fs::write(path, contents)
    }

    /// Mark a file executable for everyone who can read it
    fn set_executable(&self, path: &Path) -> io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mut permissions = fs::metadata(path)?.permissions();
            let mode = permissions.mode();
            permissions.set_mode(mode | ((mode & 0o444) >> 2));
            fs::set_permissions(path, permissions)
        }
        #[cfg(not(unix))]
        {
            let _ = path;
            Ok(())
        }
    }

    /// Recreate a symbolic link
    fn symlink(&self, link_target: &Path, link: &Path) -> io::Result<()> {
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(link_target, link)
        }
        #[cfg(not(unix))]
        {
            let _ = (link_target, link);
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "symbolic links in payloads are only supported on unix",
            ))
        }
    }

    /// Rename within one file system
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }
}

/// The real file system
#[derive(Debug, Clone, Copy, Default)]
pub struct OsIo;

impl InstallIo for OsIo {}
