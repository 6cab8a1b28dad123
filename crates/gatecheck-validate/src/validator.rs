//! Expected-vs-actual comparison for a single protected call.
//!
//! Validation is a two-step protocol. [`ActionValidator::expect`] resolves
//! the expected outcome from the policy while the worker still acts as the
//! baseline role. The test body then switches to the probed role and hands
//! the protected call to [`Expectation::observe`]. The validator never
//! switches roles itself: a switch placed after the call would make every
//! probe run as the baseline and silently pass.

use gatecheck_policy::{PolicyAuthority, PolicyError, Role};
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{Classify, ErrorKind, RuleSpec};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedOutcome {
    pub allowed: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualOutcome {
    pub allowed: bool,
    /// The denial kind observed, when `allowed` is false
    pub error_kind: Option<ErrorKind>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mismatch {
    /// The policy forbids the role but the service let it through
    OverPermission,
    /// The policy authorizes the role but the service denied it
    UnderPermission,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub rule: String,
    pub role: Role,
    pub expected: ExpectedOutcome,
    pub actual: ActualOutcome,
    pub mismatch: Option<Mismatch>,
}

impl ValidationResult {
    fn compare(rule: &str, role: &Role, expected: ExpectedOutcome, actual: ActualOutcome) -> Self {
        let mismatch = match (expected.allowed, actual.allowed) {
            (true, false) => Some(Mismatch::UnderPermission),
            (false, true) => Some(Mismatch::OverPermission),
            _ => None,
        };
        Self {
            rule: rule.to_string(),
            role: role.clone(),
            expected,
            actual,
            mismatch,
        }
    }

    pub fn passed(&self) -> bool {
        self.mismatch.is_none()
    }

    /// Turn a mismatch into a [`RbacViolation`].
    pub fn into_result(self) -> Result<Self, RbacViolation> {
        match self.mismatch {
            None => Ok(self),
            Some(Mismatch::OverPermission) => Err(RbacViolation::OverPermission {
                rule: self.rule,
                role: self.role,
            }),
            Some(Mismatch::UnderPermission) => Err(RbacViolation::UnderPermission {
                rule: self.rule,
                role: self.role,
            }),
        }
    }
}

/// A classified RBAC failure.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RbacViolation {
    #[error("over-permission: role '{role}' performed '{rule}', which the policy forbids")]
    OverPermission { rule: String, role: Role },
    #[error("under-permission: role '{role}' was denied '{rule}', which the policy allows")]
    UnderPermission { rule: String, role: Role },
}

#[derive(Debug, Error)]
pub enum ValidationError<E> {
    #[error(transparent)]
    Policy(#[from] PolicyError),
    /// The operation failed for a reason unrelated to authorization
    #[error("operation failed: {0}")]
    Operation(E),
}

#[derive(Clone, Debug)]
pub struct ActionValidator<A> {
    authority: A,
}

impl<A: PolicyAuthority> ActionValidator<A> {
    pub fn new(authority: A) -> Self {
        Self { authority }
    }

    /// Resolve what the policy says should happen for `role`.
    ///
    /// Call this before switching to the probed role.
    pub fn expect(&self, spec: &RuleSpec, role: &Role) -> Result<Expectation, PolicyError> {
        let allowed = self.authority.is_authorized(&spec.rule, role)?;
        info!(
            "Expecting {} to be {} for role {}",
            spec.rule,
            if allowed { "allowed" } else { "denied" },
            role
        );
        Ok(Expectation {
            spec: spec.clone(),
            role: role.clone(),
            expected: ExpectedOutcome { allowed },
        })
    }

    /// Expect, then run `operation` and classify its outcome.
    ///
    /// The caller must already be acting as `role` when this is called.
    pub async fn validate<F, Fut, T, E>(
        &self,
        spec: &RuleSpec,
        role: &Role,
        operation: F,
    ) -> Result<ValidationResult, ValidationError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        let expectation = self.expect(spec, role)?;
        expectation
            .observe(operation())
            .await
            .map_err(ValidationError::Operation)
    }
}

/// The expected outcome for one (rule, role) pair, awaiting the actual call.
#[derive(Clone, Debug)]
#[must_use = "an expectation does nothing until the protected call is observed"]
pub struct Expectation {
    spec: RuleSpec,
    role: Role,
    expected: ExpectedOutcome,
}

impl Expectation {
    pub fn expected(&self) -> ExpectedOutcome {
        self.expected
    }

    pub fn spec(&self) -> &RuleSpec {
        &self.spec
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Await the protected call and classify it.
    ///
    /// Errors that are not denials are returned unchanged.
    pub async fn observe<T, E, Fut>(self, operation: Fut) -> Result<ValidationResult, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        let outcome = operation.await;
        self.classify(outcome)
    }

    pub fn classify<T, E: Classify>(self, outcome: Result<T, E>) -> Result<ValidationResult, E> {
        let actual = match outcome {
            Ok(_) => ActualOutcome {
                allowed: true,
                error_kind: None,
            },
            Err(e) => {
                let kind = e.error_kind();
                if !self.spec.is_denial(kind) {
                    debug!(
                        "{} failed with non-denial error ({}); not an RBAC result",
                        self.spec.rule, kind
                    );
                    return Err(e);
                }
                ActualOutcome {
                    allowed: false,
                    error_kind: Some(kind),
                }
            }
        };

        let result = ValidationResult::compare(&self.spec.rule, &self.role, self.expected, actual);
        match result.mismatch {
            None => debug!("{} as {}: outcome matches policy", self.spec.rule, self.role),
            Some(Mismatch::OverPermission) => warn!(
                "Over-permission: {} allowed for role {} but policy forbids it",
                self.spec.rule, self.role
            ),
            Some(Mismatch::UnderPermission) => warn!(
                "Under-permission: {} denied for role {} but policy allows it",
                self.spec.rule, self.role
            ),
        }
        Ok(result)
    }
}
