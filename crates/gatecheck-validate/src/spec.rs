//! Test declarations.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ErrorKind;

/// The policy rule one test case exercises.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub component: String,
    pub service: String,
    pub rule: String,
    /// Stable identifier for reporting only
    #[serde(default)]
    pub idempotent_id: Option<Uuid>,
    /// Kinds besides [`ErrorKind::DENIAL`] that also count as a denial
    #[serde(default)]
    pub extra_denials: Vec<ErrorKind>,
}

impl RuleSpec {
    pub fn new(
        component: impl Into<String>,
        service: impl Into<String>,
        rule: impl Into<String>,
    ) -> Self {
        Self {
            component: component.into(),
            service: service.into(),
            rule: rule.into(),
            idempotent_id: None,
            extra_denials: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.idempotent_id = Some(id);
        self
    }

    pub fn with_extra_denials<I: IntoIterator<Item = ErrorKind>>(mut self, kinds: I) -> Self {
        for kind in kinds {
            if kind != ErrorKind::DENIAL && !self.extra_denials.contains(&kind) {
                self.extra_denials.push(kind);
            }
        }
        self
    }

    /// Does an error of this kind mean the service denied the call?
    pub fn is_denial(&self, kind: ErrorKind) -> bool {
        kind == ErrorKind::DENIAL || self.extra_denials.contains(&kind)
    }
}
