//! Upgrade policy enforcement
//!
//! The gate is the trust boundary of the engine: a package that is not newer
//! than what is installed never reaches the file system unless the caller
//! explicitly asked for a reinstall or a downgrade.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

use super::VersionComparator;

/// Overrides for the default "strictly newer" policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatePolicy {
    /// Permit installing the version that is already installed
    pub force_reinstall: bool,
    /// Permit installing an older version
    pub allow_downgrade: bool,
}

/// Why the gate refused a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionRejection {
    DowngradeRejected,
    IdenticalVersionRejected,
}

impl fmt::Display for VersionRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionRejection::DowngradeRejected => f.write_str("downgrade rejected"),
            VersionRejection::IdenticalVersionRejected => {
                f.write_str("identical version rejected")
            }
        }
    }
}

/// Outcome of the version gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Deny(VersionRejection),
}

/// Decide whether `candidate` may replace `installed`
pub fn check_upgrade(
    installed: &str,
    candidate: &str,
    comparator: &dyn VersionComparator,
    policy: GatePolicy,
) -> GateDecision {
    match comparator.compare(installed, candidate) {
        Ordering::Less => GateDecision::Allow,
        Ordering::Equal if policy.force_reinstall => GateDecision::Allow,
        Ordering::Equal => GateDecision::Deny(VersionRejection::IdenticalVersionRejected),
        // force_reinstall never covers a downgrade
        Ordering::Greater if policy.allow_downgrade => GateDecision::Allow,
        Ordering::Greater => GateDecision::Deny(VersionRejection::DowngradeRejected),
    }
}
