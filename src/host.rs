//! Description of the installed application

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{self, Result};
use crate::transaction::InstallReceipt;

/// Read-only snapshot of the application an update is applied to
///
/// The engine never mutates it and never reads process-wide state in its
/// place; everything it needs to know about the running application is here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostContext {
    /// Version currently installed at `installed_path`
    pub installed_version: String,

    /// Where the application is installed
    pub installed_path: PathBuf,

    /// Process id of the running application, if it is running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running_process_id: Option<u32>,

    /// Stable identifier of the application, e.g. `org.example.app`
    pub bundle_identifier: String,
}

impl HostContext {
    pub fn new(
        installed_version: impl Into<String>,
        installed_path: impl Into<PathBuf>,
        bundle_identifier: impl Into<String>,
    ) -> Self {
        Self {
            installed_version: installed_version.into(),
            installed_path: installed_path.into(),
            running_process_id: None,
            bundle_identifier: bundle_identifier.into(),
        }
    }

    /// Record the process id of the running application
    pub fn with_running_process(mut self, pid: u32) -> Self {
        self.running_process_id = Some(pid);
        self
    }

    /// Build a snapshot from the receipt left by the last successful install
    pub fn from_receipt(installed_path: &Path, bundle_identifier: &str) -> Result<Self> {
        let receipt = InstallReceipt::load(installed_path)?.ok_or_else(|| {
            error::request::invalid(format!(
                "no install receipt for {}; pass the installed version explicitly",
                installed_path.display()
            ))
        })?;

        if receipt.bundle_identifier != bundle_identifier {
            return Err(error::request::invalid(format!(
                "install receipt at {} belongs to '{}', not '{}'",
                installed_path.display(),
                receipt.bundle_identifier,
                bundle_identifier
            )));
        }

        Ok(Self::new(receipt.version, installed_path, bundle_identifier))
    }

    /// Load a snapshot from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| error::config::read_failed(path.display().to_string(), e.to_string()))?;
        serde_yaml::from_str(&yaml)
            .map_err(|e| error::config::parse_failed(path.display().to_string(), e.to_string()))
    }
}
