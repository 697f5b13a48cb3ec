//! Cycle context and callback traits
//!
//! A [`Context`] travels with every remote call so the caller can cancel a
//! cycle or bound it with a deadline. The callback traits let the executor
//! report progress and ask for confirmation without depending on any
//! particular terminal UI.

use crate::error::{Error, Result};
use crate::types::ChangeResult;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Shared cancellation flag.
///
/// Clones observe the same flag, so a token handed to another thread (a
/// signal handler, a watchdog) can stop every cycle that holds a clone.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Cancellation and deadline context for one reconciliation cycle.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancel: CancelToken,
    deadline: Option<Instant>,
}

impl Context {
    /// Create a context with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context observing an existing cancellation token.
    pub fn with_cancel(cancel: CancelToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    /// Bound the context with an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Bound the context with a timeout starting now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// The cancellation token of this context.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Time left before the deadline, if there is one.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Whether the cycle should stop: cancelled, or past its deadline.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.remaining().is_some_and(|left| left.is_zero())
    }

    /// Return `Error::Cancelled` if the cycle should stop.
    pub fn check(&self, resource: &str) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled {
                resource: resource.to_string(),
            });
        }
        Ok(())
    }
}

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called when starting to apply a batch of changes
    fn on_batch_start(&mut self, count: usize);

    /// Called when starting to apply a single change
    fn on_change_start(&mut self, address: &str, action: &str);

    /// Called when a change completes
    fn on_change_complete(&mut self, address: &str, result: &ChangeResult);

    /// Called when a batch completes
    fn on_batch_complete(&mut self);
}

/// Confirmation callback for user interaction
pub trait ConfirmCallback: Send {
    /// Ask the user to confirm an action
    ///
    /// # Returns
    /// `true` if the user confirmed, `false` otherwise
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_batch_start(&mut self, _count: usize) {}
    fn on_change_start(&mut self, _address: &str, _action: &str) {}
    fn on_change_complete(&mut self, _address: &str, _result: &ChangeResult) {}
    fn on_batch_complete(&mut self) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}
