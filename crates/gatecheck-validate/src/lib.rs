//! RBAC validation for gatecheck.
//!
//! [`ActionValidator`] compares what the policy says a role may do with what
//! the service actually let it do. [`RbacTestLifecycle`] wraps each test body
//! so that the worker is back on its baseline role, with cleanups drained,
//! before the next test starts.

mod kind;
pub mod lifecycle;
pub mod report;
mod spec;
mod validator;

pub use kind::{ClassifiedResultExt, Classify, ErrorKind};
pub use lifecycle::{
    CleanupFailure, Cleanups, LifecycleError, RbacTestLifecycle, TestError, TestScope,
};
pub use report::{
    MemoryReportLog, ReportError, ReportFilter, ReportId, ReportLog, ReportSummary,
    ValidationReport, Verdict,
};
pub use spec::RuleSpec;
pub use validator::{
    ActionValidator, ActualOutcome, ExpectedOutcome, Expectation, Mismatch, RbacViolation,
    ValidationError, ValidationResult,
};
