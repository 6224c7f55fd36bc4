//! Poll-until-target-state convergence
//!
//! Polls a resource's current status through a caller-supplied probe until
//! the status lands in a target set, a failure set, or a deadline elapses.
//! The machine is `Polling → {Converged, Failed, TimedOut}`, driven by an
//! explicit timer.

use std::collections::HashSet;
use std::future::Future;
use tokio::time::Instant;

use crate::error::{EngineError, Result};
use crate::retry::Backoff;

/// Status vocabulary for one convergence wait.
///
/// `target` and `failure` must be disjoint. Any status in neither set is
/// treated as still pending — the engine never assumes it has enumerated
/// every transient status the provider can report. The listed `pending`
/// set only controls log noise for the statuses the caller expects to see.
#[derive(Debug, Clone, Default)]
pub struct StatusSet {
    pending: HashSet<String>,
    target: HashSet<String>,
    failure: HashSet<String>,
}

impl StatusSet {
    /// # Panics
    ///
    /// Panics if `target` and `failure` overlap.
    pub fn new<P, T, F>(pending: P, target: T, failure: F) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        let set = Self {
            pending: pending.into_iter().map(Into::into).collect(),
            target: target.into_iter().map(Into::into).collect(),
            failure: failure.into_iter().map(Into::into).collect(),
        };
        assert!(
            set.target.is_disjoint(&set.failure),
            "target and failure status sets overlap"
        );
        set
    }

    pub fn is_target(&self, status: &str) -> bool {
        self.target.contains(status)
    }

    pub fn is_failure(&self, status: &str) -> bool {
        self.failure.contains(status)
    }

    pub fn is_pending(&self, status: &str) -> bool {
        self.pending.contains(status)
    }
}

/// Outcome of a single status probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// Resource exists and reports this status
    Status(String),

    /// Resource no longer exists. Converges the wait — delete probes map
    /// their not-found condition here.
    Gone,
}

/// Timing parameters for one convergence wait.
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Wall-clock budget for the whole wait
    pub deadline: std::time::Duration,

    /// Sleep schedule between polls. Fixed or growing, caller's choice.
    pub poll: Backoff,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            deadline: std::time::Duration::from_secs(600),
            poll: Backoff::fixed(std::time::Duration::from_secs(5)),
        }
    }
}

enum WaitState {
    Polling { attempt: u32 },
    Converged(Observation),
    Failed { status: String },
    TimedOut { last_status: String },
}

/// Poll `probe` until the observed status lands in `sets.target` (or the
/// resource reports [`Observation::Gone`]), lands in `sets.failure`, or
/// `config.deadline` elapses.
///
/// The first probe fires immediately; a poll whose status is in the target
/// set converges on that very poll. Probe errors terminate the wait at
/// once — transient probe failures are expected to be retried inside the
/// probe's own [`crate::retry::with_retry`] wrapping, not here. The waiter
/// holds no state across invocations beyond its own loop.
pub async fn wait_for_status<F, Fut>(
    op: &str,
    sets: &StatusSet,
    config: &WaitConfig,
    mut probe: F,
) -> Result<Observation>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Observation>>,
{
    let started = Instant::now();
    let mut state = WaitState::Polling { attempt: 0 };

    loop {
        state = match state {
            WaitState::Polling { attempt } => match probe().await? {
                Observation::Gone => WaitState::Converged(Observation::Gone),
                Observation::Status(status) if sets.is_target(&status) => {
                    WaitState::Converged(Observation::Status(status))
                }
                Observation::Status(status) if sets.is_failure(&status) => {
                    WaitState::Failed { status }
                }
                Observation::Status(status) => {
                    if !sets.is_pending(&status) {
                        tracing::debug!(op, status = %status, "unlisted status, treating as pending");
                    }
                    let delay = config.poll.delay(attempt);
                    if started.elapsed() + delay >= config.deadline {
                        WaitState::TimedOut { last_status: status }
                    } else {
                        tokio::time::sleep(delay).await;
                        WaitState::Polling { attempt: attempt + 1 }
                    }
                }
            },
            WaitState::Converged(observation) => {
                tracing::debug!(op, elapsed_ms = started.elapsed().as_millis() as u64, "converged");
                return Ok(observation);
            }
            WaitState::Failed { status } => {
                return Err(EngineError::ConvergenceFailed {
                    op: op.to_string(),
                    status,
                });
            }
            WaitState::TimedOut { last_status } => {
                return Err(EngineError::ConvergenceTimedOut {
                    op: op.to_string(),
                    waited: started.elapsed(),
                    last_status: Some(last_status),
                });
            }
        };
    }
}
