//! Error types for reconciliation.
//!
//! Errors are categorized so callers can tell a user-visible timeout apart
//! from a fatal remote failure. Remote failures carry the status signal they
//! were raised with; nothing in this crate inspects error message text.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a remote client.
///
/// This is the failure signal the engine consumes: `status` holds the HTTP
/// status when the server answered, and is `None` for transport failures
/// (connection refused, TLS, decode errors).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}{message}", .status.map(|s| format!("HTTP {s}: ")).unwrap_or_default())]
pub struct RemoteError {
    /// HTTP status code if the server answered.
    pub status: Option<u16>,
    /// Error message.
    pub message: String,
}

impl RemoteError {
    /// Create a remote error from an HTTP status.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Create a remote error for a failure that never reached the server.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// Create the error a client returns when an entity does not exist.
    pub fn not_found(what: impl fmt::Display) -> Self {
        Self::status(404, format!("{what} not found"))
    }

    /// Whether the server reported that the entity does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

/// Categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Stored identity could not be decoded.
    Identity,
    /// Remote request failed.
    Remote,
    /// Remote entity does not exist.
    NotFound,
    /// Waiting for background completion took too long.
    Timeout,
    /// The caller cancelled the cycle or its deadline passed.
    Cancelled,
    /// A declared value cannot be sent to the remote API.
    Validation,
    /// The remote system answered in a way that contradicts the request.
    Inconsistent,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Identity => "Malformed resource identity",
            Self::Remote => "Remote request failed",
            Self::NotFound => "Remote object not found",
            Self::Timeout => "Timed out waiting for the remote system",
            Self::Cancelled => "Operation cancelled",
            Self::Validation => "Invalid attribute value",
            Self::Inconsistent => "Inconsistent remote result",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Identity => "Check the identity format or re-import the resource",
            Self::Remote => "Check connectivity and credentials, then try again",
            Self::NotFound => "The object was removed outside of this tool",
            Self::Timeout => "The remote system may still finish; refresh later to confirm",
            Self::Cancelled => "Run the command again to finish the remaining work",
            Self::Validation => "Fix the attribute value in the manifest",
            Self::Inconsistent => "Refresh state and review the remote object",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur during a reconciliation cycle.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Identity string cannot be decoded into the expected parts.
    #[error("malformed identity {id:?}: {reason}")]
    MalformedIdentity {
        /// The offending identity string.
        id: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Remote request failed.
    #[error("remote request failed: {0}")]
    Remote(#[from] RemoteError),

    /// Background completion did not finish before the poller's deadline.
    #[error("timed out after {elapsed:?} waiting for {resource} (last state: {last_state})")]
    Timeout {
        /// Resource being waited on.
        resource: String,
        /// Time spent waiting.
        elapsed: Duration,
        /// Last state reported by the probe.
        last_state: String,
    },

    /// The cycle was cancelled or its deadline passed.
    #[error("cancelled while working on {resource}")]
    Cancelled {
        /// Resource being worked on.
        resource: String,
    },

    /// Attribute value cannot be represented on the wire.
    #[error("invalid value for {attribute}: {message}")]
    Validation {
        /// Attribute name.
        attribute: String,
        /// Error message.
        message: String,
    },

    /// Remote result contradicts what was requested.
    #[error("{resource}: {message}")]
    Inconsistent {
        /// Resource type or identity.
        resource: String,
        /// Error message.
        message: String,
    },

    /// A listing endpoint returned a cursor that does not move forward.
    #[error("pagination stalled at page {page} (server returned next page {next})")]
    PaginationStalled {
        /// Page that was requested.
        page: u32,
        /// Cursor the server returned.
        next: u32,
    },
}

impl Error {
    /// Create a malformed identity error.
    pub fn malformed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedIdentity {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    /// Create an inconsistent-result error.
    pub fn inconsistent(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Inconsistent {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::MalformedIdentity { .. } => ErrorCategory::Identity,
            Error::Remote(remote) if remote.is_not_found() => ErrorCategory::NotFound,
            Error::Remote(_) => ErrorCategory::Remote,
            Error::Timeout { .. } => ErrorCategory::Timeout,
            Error::Cancelled { .. } => ErrorCategory::Cancelled,
            Error::Validation { .. } => ErrorCategory::Validation,
            Error::Inconsistent { .. } | Error::PaginationStalled { .. } => {
                ErrorCategory::Inconsistent
            }
        }
    }

    /// The remote status code, if this error came from the server.
    #[must_use]
    pub fn remote_status(&self) -> Option<u16> {
        match self {
            Error::Remote(remote) => remote.status,
            _ => None,
        }
    }
}
