use crate::error::{EstablishError, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source for deadline accounting.
///
/// Injected rather than read directly so tests can simulate elapsed time
/// without real delay; see [`testing::FakeClock`](crate::testing::FakeClock).
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Production [`Clock`] backed by [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Cumulative elapsed time measured against one absolute deadline.
///
/// The deadline is fixed at pipeline start and shared by every stage; it is
/// never reset per stage. With no limit, time-based aborts are disabled and
/// only protocol failures end the attempt.
#[derive(Clone)]
pub struct TimeBudget {
    clock: Arc<dyn Clock>,
    started: Instant,
    limit: Option<Duration>,
}

impl TimeBudget {
    pub fn start(clock: Arc<dyn Clock>, limit: Option<Duration>) -> Self {
        let started = clock.now();
        Self {
            clock,
            started,
            limit,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.started)
    }

    /// Time left before the deadline, or `None` when no limit was supplied.
    pub fn remaining(&self) -> Option<Duration> {
        self.limit.map(|limit| limit.saturating_sub(self.elapsed()))
    }

    pub fn expired(&self) -> bool {
        matches!(self.remaining(), Some(remaining) if remaining.is_zero())
    }

    /// Cooperative deadline check at a stage boundary.
    ///
    /// The check runs after blocking operations, not during them; an
    /// operation that overshoots is aborted here even though its result
    /// already arrived.
    pub fn check(&self, stage: &'static str) -> Result<()> {
        if self.expired() {
            Err(EstablishError::DeadlineExceeded(stage))
        } else {
            Ok(())
        }
    }
}
