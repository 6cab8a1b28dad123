//! Compute API collaborator for gatecheck.
//!
//! [`ComputeClient`] is the API surface the compute RBAC cases probe.
//! [`FakeCompute`] is an in-memory compute service that enforces a deployed
//! policy, and [`suite`] holds the cases themselves.

pub mod client;
mod error;
pub mod fake;
pub mod rules;
pub mod suite;
pub mod types;

pub use client::ComputeClient;
#[cfg(any(test, feature = "test-support"))]
pub use client::MockComputeClient;
pub use error::ApiError;
pub use fake::{FakeCompute, FakeComputeClient};
pub use suite::{CaseError, ComputeCase, ComputeRbacSuite, PolicyValidator};
pub use types::*;
