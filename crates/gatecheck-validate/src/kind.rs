//! Error classification shared by the validator and its collaborators.

use serde::{Deserialize, Serialize};

/// Coarse kind of a failed API call, as far as RBAC validation cares.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The designated "authorization denied" kind
    Forbidden,
    Unauthorized,
    NotFound,
    BadRequest,
    Conflict,
    ServerFault,
    Other,
}

impl ErrorKind {
    /// The kind every operation collaborator must raise on a policy denial.
    pub const DENIAL: ErrorKind = ErrorKind::Forbidden;

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::NotFound => "not_found",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Conflict => "conflict",
            ErrorKind::ServerFault => "server_fault",
            ErrorKind::Other => "other",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forbidden" => Ok(ErrorKind::Forbidden),
            "unauthorized" => Ok(ErrorKind::Unauthorized),
            "not_found" => Ok(ErrorKind::NotFound),
            "bad_request" => Ok(ErrorKind::BadRequest),
            "conflict" => Ok(ErrorKind::Conflict),
            "server_fault" => Ok(ErrorKind::ServerFault),
            "other" => Ok(ErrorKind::Other),
            _ => Err(format!("unknown error kind: {}", s)),
        }
    }
}

/// Errors from an operation collaborator expose their kind through this trait.
pub trait Classify {
    fn error_kind(&self) -> ErrorKind;
}

/// Helpers for results whose error type is classifiable.
pub trait ClassifiedResultExt<T, E> {
    /// Treat errors of the given kinds as a successful call with no value.
    ///
    /// Used when an error proves the request got past authorization, e.g. a
    /// `BadRequest` for a nonexistent migration target.
    fn tolerate(self, kinds: &[ErrorKind]) -> Result<Option<T>, E>;

    /// `NotFound` means the resource is already gone.
    fn ignore_not_found(self) -> Result<Option<T>, E>;
}

impl<T, E: Classify> ClassifiedResultExt<T, E> for Result<T, E> {
    fn tolerate(self, kinds: &[ErrorKind]) -> Result<Option<T>, E> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) if kinds.contains(&e.error_kind()) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn ignore_not_found(self) -> Result<Option<T>, E> {
        self.tolerate(&[ErrorKind::NotFound])
    }
}
