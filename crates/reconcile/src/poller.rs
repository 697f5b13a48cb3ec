//! Async completion poller
//!
//! Some remote operations finish in the background (GitLab marks a group for
//! deletion and removes it later). [`wait_for`] re-runs a caller-supplied probe
//! on a fixed interval until it reports [`PollState::Done`], the probe fails,
//! the timeout passes, or the context is cancelled.

use crate::context::Context;
use crate::error::{Error, Result};
use std::thread;
use std::time::{Duration, Instant};

/// Granularity of cancellation checks while sleeping.
const SLICE: Duration = Duration::from_millis(10);

/// Polling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Time between probes.
    pub interval: Duration,
    /// Grace period before the first probe.
    pub initial_delay: Duration,
    /// Overall deadline, counted from the call.
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            initial_delay: Duration::from_secs(5),
            timeout: Duration::from_secs(10 * 60),
        }
    }
}

impl PollConfig {
    /// No initial delay, for callers that probe right away.
    pub fn immediate(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            initial_delay: Duration::ZERO,
            timeout,
        }
    }
}

/// What a probe observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState<T> {
    /// Not there yet; the string describes the observed state.
    Pending(String),
    /// Terminal condition reached.
    Done(T),
}

/// Probe until done.
///
/// The probe runs at least once. Probe errors are returned as-is. Reaching
/// `config.timeout` yields `Error::Timeout` carrying the elapsed time and the
/// last pending state; cancellation (or the context's own deadline) yields
/// `Error::Cancelled`.
pub fn wait_for<T, F>(ctx: &Context, resource: &str, config: &PollConfig, mut probe: F) -> Result<T>
where
    F: FnMut(&Context) -> Result<PollState<T>>,
{
    let start = Instant::now();
    let deadline = start + config.timeout;
    let mut probes = 0u32;

    log::debug!("waiting for {resource} (timeout {:?})", config.timeout);
    sleep_until(ctx, resource, (start + config.initial_delay).min(deadline))?;

    let last_state = loop {
        ctx.check(resource)?;

        probes += 1;
        let state = match probe(ctx)? {
            PollState::Done(value) => {
                log::debug!("{resource} done after {probes} probes, {:?}", start.elapsed());
                return Ok(value);
            }
            PollState::Pending(state) => state,
        };
        log::trace!("{resource} still {state}");

        let now = Instant::now();
        if now >= deadline {
            break state;
        }
        sleep_until(ctx, resource, (now + config.interval).min(deadline))?;
        if Instant::now() >= deadline {
            break state;
        }
    };

    Err(Error::Timeout {
        resource: resource.to_string(),
        elapsed: start.elapsed(),
        last_state,
    })
}

fn sleep_until(ctx: &Context, resource: &str, until: Instant) -> Result<()> {
    loop {
        ctx.check(resource)?;
        let now = Instant::now();
        if now >= until {
            return Ok(());
        }
        thread::sleep((until - now).min(SLICE));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CancelToken;
    use crate::error::RemoteError;

    #[test]
    fn test_done_on_first_probe() {
        let ctx = Context::new();
        let config = PollConfig::immediate(Duration::from_millis(10), Duration::from_secs(1));
        let value = wait_for(&ctx, "group 1", &config, |_| Ok(PollState::Done(7))).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_done_after_pending() {
        let ctx = Context::new();
        let config = PollConfig::immediate(Duration::from_millis(5), Duration::from_secs(5));
        let mut probes = 0;
        let value = wait_for(&ctx, "group 1", &config, |_| {
            probes += 1;
            if probes < 3 {
                Ok(PollState::Pending("deleting".into()))
            } else {
                Ok(PollState::Done("deleted"))
            }
        })
        .unwrap();
        assert_eq!(value, "deleted");
        assert_eq!(probes, 3);
    }

    #[test]
    fn test_timeout() {
        let ctx = Context::new();
        let config = PollConfig::immediate(Duration::from_millis(50), Duration::from_millis(200));
        let mut probes = 0;
        let start = Instant::now();

        let err = wait_for(&ctx, "gitlab_group 42", &config, |_| -> Result<PollState<()>> {
            probes += 1;
            Ok(PollState::Pending("deleting".into()))
        })
        .unwrap_err();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(600), "took {elapsed:?}");
        assert!((3..=4).contains(&probes), "probes: {probes}");
        match err {
            Error::Timeout {
                resource,
                elapsed,
                last_state,
            } => {
                assert_eq!(resource, "gitlab_group 42");
                assert!(elapsed >= Duration::from_millis(200));
                assert_eq!(last_state, "deleting");
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_timeout_reports_latest_state() {
        let ctx = Context::new();
        let config = PollConfig::immediate(Duration::from_millis(20), Duration::from_millis(70));
        let mut probes = 0;

        let err = wait_for(&ctx, "gitlab_group 42", &config, |_| -> Result<PollState<()>> {
            probes += 1;
            Ok(PollState::Pending(format!("deleting ({probes})")))
        })
        .unwrap_err();
        assert!(probes > 1);
        let expected = format!("deleting ({probes})");
        assert!(matches!(err, Error::Timeout { ref last_state, .. } if *last_state == expected));

        let zero = PollConfig::immediate(Duration::from_millis(20), Duration::ZERO);
        let mut probes = 0;
        let err = wait_for(&ctx, "gitlab_group 43", &zero, |_| -> Result<PollState<()>> {
            probes += 1;
            Ok(PollState::Pending("queued".into()))
        })
        .unwrap_err();
        assert_eq!(probes, 1);
        assert!(matches!(err, Error::Timeout { ref last_state, .. } if last_state == "queued"));
    }

    #[test]
    fn test_probe_error_propagates() {
        let ctx = Context::new();
        let config = PollConfig::immediate(Duration::from_millis(5), Duration::from_secs(1));
        let err = wait_for(&ctx, "group 1", &config, |_| -> Result<PollState<()>> {
            Err(RemoteError::status(500, "boom").into())
        })
        .unwrap_err();
        assert_eq!(err.remote_status(), Some(500));
    }

    #[test]
    fn test_initial_delay() {
        let ctx = Context::new();
        let config = PollConfig {
            interval: Duration::from_millis(5),
            initial_delay: Duration::from_millis(40),
            timeout: Duration::from_secs(1),
        };
        let start = Instant::now();
        wait_for(&ctx, "group 1", &config, |_| Ok(PollState::Done(()))).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_cancel_mid_poll() {
        let token = CancelToken::new();
        let ctx = Context::with_cancel(token.clone());
        let config = PollConfig::immediate(Duration::from_millis(20), Duration::from_secs(30));

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(60));
            token.cancel();
        });

        let start = Instant::now();
        let err = wait_for(&ctx, "group 1", &config, |_| -> Result<PollState<()>> {
            Ok(PollState::Pending("deleting".into()))
        })
        .unwrap_err();
        canceller.join().unwrap();

        assert!(matches!(err, Error::Cancelled { .. }));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_context_deadline_is_cancellation() {
        let ctx = Context::new().with_timeout(Duration::from_millis(50));
        let config = PollConfig::immediate(Duration::from_millis(10), Duration::from_secs(30));
        let err = wait_for(&ctx, "group 1", &config, |_| -> Result<PollState<()>> {
            Ok(PollState::Pending("deleting".into()))
        })
        .unwrap_err();
        assert!(matches!(err, Error::Cancelled { .. }));
    }

    #[test]
    fn test_default_config() {
        let config = PollConfig::default();
        assert_eq!(config.interval, Duration::from_secs(3));
        assert_eq!(config.initial_delay, Duration::from_secs(5));
        assert_eq!(config.timeout, Duration::from_secs(600));
    }
}
