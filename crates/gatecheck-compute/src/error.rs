use gatecheck_validate::{Classify, ErrorKind};
use thiserror::Error;

/// A failed compute API call.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The denial every protected call raises when policy forbids it.
    pub fn forbidden(rule: &str) -> Self {
        Self::new(
            ErrorKind::Forbidden,
            format!("Policy doesn't allow {} to be performed.", rule),
        )
    }

    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::new(ErrorKind::NotFound, format!("{} could not be found.", what))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn server_fault(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServerFault, message)
    }
}

impl Classify for ApiError {
    fn error_kind(&self) -> ErrorKind {
        self.kind
    }
}
