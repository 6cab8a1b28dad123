//! Common utilities for E2E tests.

pub mod harness;

#[allow(unused_imports)]
pub use harness::*;
