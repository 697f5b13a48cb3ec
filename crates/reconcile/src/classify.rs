//! Not-found classification
//!
//! A remote 404 on read or delete means the entity is gone, which is a state,
//! not a failure. Everything else is fatal.

use crate::error::{Error, Result};

/// Outcome of classifying a failed remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The remote entity does not exist.
    NotFound,
    /// Propagate the error unchanged.
    Fatal,
}

/// Classify an error by its status signal.
pub fn classify(err: &Error) -> Classification {
    match err {
        Error::Remote(remote) if remote.is_not_found() => Classification::NotFound,
        _ => Classification::Fatal,
    }
}

/// Turn a not-found failure into `Ok(None)`.
pub fn absorb_not_found<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if classify(&err) == Classification::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}
