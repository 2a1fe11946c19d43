//! Bounded-retry condition poller.
//!
//! Observers of the eventually-consistent store cannot branch on a single
//! read: a write they are waiting for may simply not be visible yet. The
//! poller re-evaluates an asynchronous check on a fixed cadence until it
//! succeeds or a retry budget runs out, at which point the condition is
//! fatal to the caller (a driver that waited for convergence that never
//! came), not a recoverable state.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::domain::PollExhausted;

/// Retry budget and spacing for [`poll`].
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Total check invocations allowed, including the first.
    pub max_attempts: u32,

    /// Cooperative sleep between consecutive attempts.
    pub interval: Duration,
}

impl PollPolicy {
    /// A zero budget would never run the check, so it is clamped to one.
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(10, Duration::from_millis(100))
    }
}

/// Retry loop state. Succeeded and FatallyFailed are terminal; Pending
/// counts down one attempt per check failure.
enum PollState<T, E> {
    Pending { attempts_left: u32 },
    Succeeded(T),
    FatallyFailed(E),
}

/// Evaluate `check` until it succeeds or the attempt budget is exhausted.
///
/// On the first success, `on_success(value)` is handed to the scheduler as a
/// fresh task rather than invoked inline: a panic inside the continuation
/// surfaces on the returned [`JoinHandle`] and can never be mistaken for a
/// failure of `check` itself. On exhaustion the final failure is returned as
/// [`PollExhausted`].
///
/// A check that fails before its future ever suspends is treated exactly
/// like one that fails asynchronously; the loop only sees the `Err` arm.
pub async fn poll<C, Fut, T, E, S>(
    policy: &PollPolicy,
    mut check: C,
    on_success: S,
) -> Result<JoinHandle<()>, PollExhausted<E>>
where
    C: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    T: Send + 'static,
    E: std::error::Error + 'static,
    S: FnOnce(T) + Send + 'static,
{
    let mut state = PollState::Pending {
        attempts_left: policy.max_attempts,
    };

    loop {
        state = match state {
            PollState::Pending { attempts_left } => match check().await {
                Ok(value) => PollState::Succeeded(value),
                Err(error) if attempts_left > 1 => {
                    debug!(attempts_left = attempts_left - 1, error = %error, "check failed; retrying");
                    tokio::time::sleep(policy.interval).await;
                    PollState::Pending {
                        attempts_left: attempts_left - 1,
                    }
                }
                Err(error) => PollState::FatallyFailed(error),
            },
            PollState::Succeeded(value) => {
                return Ok(tokio::spawn(async move { on_success(value) }));
            }
            PollState::FatallyFailed(last_error) => {
                return Err(PollExhausted {
                    attempts: policy.max_attempts,
                    last_error,
                });
            }
        };
    }
}

/// Wrap a fallible callback so its error goes to `on_error` instead of
/// propagating into whoever invokes the callback.
///
/// Useful for handing completion callbacks to machinery that must not be
/// derailed by a consumer's own failure.
pub fn guard<T, E, F, H>(mut f: F, mut on_error: H) -> impl FnMut(T)
where
    F: FnMut(T) -> Result<(), E>,
    H: FnMut(E),
{
    move |value| {
        if let Err(error) = f(value) {
            on_error(error);
        }
    }
}

/// Minimal failure for checks that have nothing more specific to report
/// than "not true yet".
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CheckFailed(pub String);

impl CheckFailed {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}
