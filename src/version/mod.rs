//! Version ordering and the upgrade gate
//!
//! The engine never interprets version strings itself: ordering comes from a
//! caller-supplied [`VersionComparator`], and [`check_upgrade`] turns that
//! ordering into an allow/deny decision.

pub mod comparator;
pub mod gate;

pub use comparator::{StandardVersionComparator, VersionComparator};
pub use gate::{GateDecision, GatePolicy, VersionRejection, check_upgrade};
