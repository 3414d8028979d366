//! Error types for fleetplane
//!
//! Every component classifies its failures into one of the [`ErrorKind`]s
//! below. The HTTP layer maps kinds to status codes; nothing in here knows
//! about transport concerns.

use serde::Serialize;
use thiserror::Error;

/// Classification of an [`Error`], stable across variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    Conflict,
    NotFound,
    Forbidden,
    BackendUnavailable,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::BackendUnavailable => "backend_unavailable",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing input, always caller-fixable
    #[error("{0}")]
    InvalidArgument(String),

    /// Something with the same key already exists
    #[error("conflict: {kind} {what} already exists")]
    Conflict { kind: &'static str, what: String },

    #[error("{kind} {what} not found")]
    NotFound { kind: &'static str, what: String },

    /// Authorization predicate denied the operation
    #[error("{subject} is not allowed to {action} {resource}")]
    Forbidden {
        subject: String,
        action: String,
        resource: String,
    },

    /// Timeout, refused connection or failed liveness probe
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    pub fn not_found(kind: &'static str, what: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            what: what.into(),
        }
    }

    pub fn conflict(kind: &'static str, what: impl Into<String>) -> Self {
        Error::Conflict {
            kind,
            what: what.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::Conflict { .. } => ErrorKind::Conflict,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Forbidden { .. } => ErrorKind::Forbidden,
            Error::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            Error::Internal(_) | Error::ConfigError(_) => ErrorKind::Internal,
        }
    }

    /// Only transient backend failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::BackendUnavailable
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    /// Classify a kube client error raised while operating on `what` (of
    /// type `kind`).
    ///
    /// The message of the API response is kept, since the API server never
    /// echoes credentials; transport errors are summarized.
    pub fn from_kube(err: kube::Error, kind: &'static str, what: &str) -> Self {
        match err {
            kube::Error::Api(resp) => match resp.code {
                404 => Error::not_found(kind, what),
                409 => Error::conflict(kind, what),
                400 | 422 => Error::InvalidArgument(format!("{} {}: {}", kind, what, resp.message)),
                401 | 403 => Error::BackendUnavailable(format!(
                    "management cluster rejected the stored credential ({})",
                    resp.reason
                )),
                429 | 500..=599 => Error::BackendUnavailable(format!(
                    "management cluster answered {}: {}",
                    resp.code, resp.message
                )),
                code => Error::Internal(format!(
                    "unexpected API response {} for {} {}: {}",
                    code, kind, what, resp.message
                )),
            },
            kube::Error::SerdeError(e) => {
                Error::Internal(format!("failed to decode {} {}: {}", kind, what, e))
            }
            other => Error::BackendUnavailable(format!(
                "management cluster unreachable: {}",
                transport_summary(&other)
            )),
        }
    }
}

/// Short, credential-free description of a transport level kube error.
fn transport_summary(err: &kube::Error) -> &'static str {
    match err {
        kube::Error::HyperError(_) => "connection failed",
        kube::Error::Service(_) => "request failed",
        kube::Error::Auth(_) => "authentication failed",
        kube::Error::InferConfig(_) => "invalid client configuration",
        _ => "client error",
    }
}
