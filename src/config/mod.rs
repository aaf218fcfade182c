//! Installer configuration
//!
//! [`InstallOptions`] is what the engine reads for one request.
//! [`InstallerConfig`] is its on-disk form (`updraft.yaml`), loaded by the CLI
//! and merged with command-line flags.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{self, Result};
use crate::version::GatePolicy;

/// Per-request behaviour switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallOptions {
    /// Permit reinstalling the installed version
    pub force_reinstall: bool,

    /// Permit installing an older version
    pub allow_downgrade: bool,

    /// Verify the staged payload against the package checksum when one is declared
    pub verify_checksum: bool,

    /// Refuse packages that declare no checksum
    pub require_checksum: bool,

    /// Refuse packages whose bundle identifier differs from the host's
    pub require_matching_identifier: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            force_reinstall: false,
            allow_downgrade: false,
            verify_checksum: true,
            require_checksum: false,
            require_matching_identifier: true,
        }
    }
}

impl InstallOptions {
    /// Version gate overrides carried by these options
    pub fn gate_policy(&self) -> GatePolicy {
        GatePolicy {
            force_reinstall: self.force_reinstall,
            allow_downgrade: self.allow_downgrade,
        }
    }
}

/// Installer settings file (updraft.yaml)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct InstallerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_reinstall: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_downgrade: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_checksum: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_checksum: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_matching_identifier: Option<bool>,
}

impl InstallerConfig {
    /// Parse installer configuration from YAML string
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        // An empty file is a valid, empty configuration
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }

    /// Load installer configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| error::config::read_failed(path.display().to_string(), e.to_string()))?;

        Self::from_yaml(&yaml)
            .map_err(|e| error::config::parse_failed(path.display().to_string(), e.to_string()))
    }

    /// Resolve into engine options, starting from the defaults
    pub fn to_options(&self) -> InstallOptions {
        let defaults = InstallOptions::default();
        InstallOptions {
            force_reinstall: self.force_reinstall.unwrap_or(defaults.force_reinstall),
            allow_downgrade: self.allow_downgrade.unwrap_or(defaults.allow_downgrade),
            verify_checksum: self.verify_checksum.unwrap_or(defaults.verify_checksum),
            require_checksum: self.require_checksum.unwrap_or(defaults.require_checksum),
            require_matching_identifier: self
                .require_matching_identifier
                .unwrap_or(defaults.require_matching_identifier),
        }
    }
}
