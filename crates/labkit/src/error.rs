//! Error types for GitLab client setup.
//!
//! Remote calls made on behalf of the engine return [`reconcile::Error`]
//! directly. This module covers everything before the first call: provider
//! configuration, TLS material, and the early credential check.

use reconcile::RemoteError;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias for client setup.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of client setup errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Provider configuration is invalid.
    Config,
    /// Certificates or keys could not be loaded.
    Tls,
    /// The server rejected the credentials.
    Auth,
    /// The server could not be reached.
    Network,
    /// A local file could not be read.
    Io,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Config => "Invalid provider configuration",
            Self::Tls => "TLS setup failed",
            Self::Auth => "Authentication failed",
            Self::Network => "Network connectivity issue",
            Self::Io => "File access error",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Config => "Check the [provider] table of the manifest",
            Self::Tls => "Check that cacert_file, client_cert and client_key hold PEM data",
            Self::Auth => "Check the token, or set GITLAB_TOKEN",
            Self::Network => "Check the base URL and your connection, then try again",
            Self::Io => "Check that the file exists and is readable",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while setting up a GitLab client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A configuration value is missing or malformed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// TLS material could not be used.
    #[error("TLS setup failed for {path}: {message}")]
    Tls {
        /// File the material came from.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// A local file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A request failed before or during the credential check.
    #[error("GitLab request failed: {0}")]
    Remote(#[from] RemoteError),

    /// The engine reported an error.
    #[error(transparent)]
    Reconcile(#[from] reconcile::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a TLS error for a file.
    pub fn tls(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        Self::Tls {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Get the category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::Config,
            Self::Tls { .. } => ErrorCategory::Tls,
            Self::Io { .. } => ErrorCategory::Io,
            Self::Remote(err) => remote_category(err),
            Self::Reconcile(reconcile::Error::Remote(err)) => remote_category(err),
            Self::Reconcile(_) => ErrorCategory::Other,
        }
    }
}

fn remote_category(err: &RemoteError) -> ErrorCategory {
    match err.status {
        Some(401 | 403) => ErrorCategory::Auth,
        Some(_) => ErrorCategory::Other,
        None => ErrorCategory::Network,
    }
}

/// Convert a transport failure into the engine's failure signal.
///
/// Agents are built with `http_status_as_error(false)`, so status codes reach
/// the caller as responses; this only sees failures without one.
pub(crate) fn transport(err: ureq::Error) -> RemoteError {
    match err {
        ureq::Error::StatusCode(code) => RemoteError::status(code, format!("HTTP {code}")),
        ureq::Error::Timeout(timeout) => RemoteError::transport(format!("request timed out ({timeout:?})")),
        other => RemoteError::transport(other.to_string()),
    }
}
