//! Policy authority for gatecheck.
//!
//! Loads a declarative access policy (rule name → boolean expression over
//! roles) and answers "does role X satisfy rule R". Loading is eager: every
//! expression is parsed, every `rule:` reference resolved to an index, and the
//! reference graph checked for cycles before a [`Policy`] is handed out.
//! Evaluation is a pure function of (policy, rule, role).

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub mod expr;
mod parser;
pub mod policy;
pub mod role;

pub use expr::{Expr, RuleId};
pub use policy::{Policy, PolicySource};
pub use role::{ParseRoleError, Role};

/// Errors raised while loading or querying a policy.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("malformed expression for rule '{rule}' at offset {position}: {message}")]
    Parse {
        rule: String,
        position: usize,
        message: String,
    },
    #[error("rule '{rule}' not found in policy")]
    RuleNotFound { rule: String },
    #[error("rule '{rule}' references undefined rule '{target}'")]
    UndefinedReference { rule: String, target: String },
    #[error("cyclic rule reference: {}", cycle.join(" -> "))]
    CyclicRule { cycle: Vec<String> },
    #[error("failed to read policy file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid policy document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Resolves whether a role satisfies a named rule.
///
/// The validator depends on this trait rather than on [`Policy`] directly.
#[cfg_attr(any(test, feature = "test-support"), mockall::automock)]
pub trait PolicyAuthority: Send + Sync {
    fn is_authorized(&self, rule: &str, role: &Role) -> Result<bool, PolicyError>;
}

impl PolicyAuthority for Policy {
    fn is_authorized(&self, rule: &str, role: &Role) -> Result<bool, PolicyError> {
        self.evaluate(rule, role)
    }
}

impl<A: PolicyAuthority + ?Sized> PolicyAuthority for Arc<A> {
    fn is_authorized(&self, rule: &str, role: &Role) -> Result<bool, PolicyError> {
        (**self).is_authorized(rule, role)
    }
}
