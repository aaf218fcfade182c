//! Command helper utilities

use std::path::{Path, PathBuf};

use serde::Serialize;
use updraft::error::{self, Result};

/// Resolve a user-supplied path against the current directory
///
/// The engine only accepts absolute paths.
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| {
        error::request::invalid(format!("cannot resolve {}: {e}", path.display()))
    })
}

/// Print a value as pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(error::request::output_failed)?;
    println!("{json}");
    Ok(())
}
