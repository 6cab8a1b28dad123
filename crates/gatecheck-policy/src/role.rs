//! Role identities carried by the active credential.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Identity class a request is made as (e.g. `admin`, `member`).
///
/// Roles are opaque: the only operation the policy engine performs on them
/// is equality against the name in a `role:<name>` check.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

/// Error type for parsing Role from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRoleError(pub String);

impl std::fmt::Display for ParseRoleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid role: {:?}", self.0)
    }
}

impl std::error::Error for ParseRoleError {}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = !s.is_empty()
            && !s
                .chars()
                .any(|c| c.is_whitespace() || c == '(' || c == ')');
        if valid {
            Ok(Role(s.to_string()))
        } else {
            Err(ParseRoleError(s.to_string()))
        }
    }
}

impl Role {
    /// Build a role without validation. Prefer `parse` for untrusted input.
    pub fn new(name: impl Into<String>) -> Self {
        Role(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(name: &str) -> Self {
        Role::new(name)
    }
}
