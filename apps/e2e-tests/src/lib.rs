//! Policy fixtures shared by the end-to-end tests.

use gatecheck_policy::{Policy, PolicyError};
use std::path::PathBuf;

/// Policy every case is declared against.
pub const DECLARED: &str = "policy.json";
/// Deployment that lets members force-delete and hides instance actions from them.
pub const DRIFTED: &str = "deployed_drift.json";
/// Deployment that only names a handful of rules and falls back to an admin-only default.
pub const SPARSE: &str = "deployed_sparse.json";

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
}

pub fn load_fixture(name: &str) -> Result<Policy, PolicyError> {
    Policy::from_path(fixture_path(name))
}
