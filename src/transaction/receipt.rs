//! Install receipt (`.<name>.updraft-receipt.json`)
//!
//! Records what the last successful commit put at a target. It lives beside
//! the install, never inside it, so the payload stays byte-for-byte what the
//! package shipped.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{self, Result};

const RECEIPT_SUFFIX: &str = "receipt.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReceipt {
    pub bundle_identifier: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl InstallReceipt {
    /// Where the receipt for `target` is stored
    pub fn path_for(target: &Path) -> Result<PathBuf> {
        super::sidecar_path(target, RECEIPT_SUFFIX)
    }

    /// Load the receipt for `target`, if there is one
    pub fn load(target: &Path) -> Result<Option<Self>> {
        let path = Self::path_for(target)?;
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(error::config::read_failed(
                    path.display().to_string(),
                    e.to_string(),
                ));
            }
        };

        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| error::config::parse_failed(path.display().to_string(), e.to_string()))
    }

    /// Write the receipt for `target`, replacing any previous one
    pub fn store(&self, target: &Path) -> std::io::Result<()> {
        let path = Self::path_for(target).map_err(std::io::Error::other)?;
        super::journal::write_json_atomically(&path, self)
    }
}
