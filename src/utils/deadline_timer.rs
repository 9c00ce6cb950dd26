use std::future;
use std::time::Duration;

use tokio::time::sleep_until;
use tokio::time::Instant;

/// One-shot timer that owns its deadline.
///
/// There is never more than one pending deadline. `arm_if_idle` keeps an
/// existing deadline, `rearm` pushes it out (debounce), `clear` cancels it.
/// The owner polls [`DeadlineTimer::expired`] from its select loop and
/// clears or re-arms after it fires.
#[derive(Debug, Clone)]
pub struct DeadlineTimer {
    interval: Duration,
    deadline: Option<Instant>,
}

impl DeadlineTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    /// Returns true when a new deadline was set
    pub fn arm_if_idle(&mut self) -> bool {
        if self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(Instant::now() + self.interval);
        true
    }

    pub fn rearm(&mut self) {
        self.deadline = Some(Instant::now() + self.interval);
    }

    pub fn clear(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Completes at the deadline; never completes while disarmed
    pub async fn expired(&self) {
        match self.deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => future::pending::<()>().await,
        }
    }
}
