//! The single recovery deadline a blocked reconciler waits on.
//!
//! The timer does not sleep by itself; it records when recovery is due and
//! whoever drives the reconciler (see [`crate::runtime`]) wakes it up then.

use core::time::Duration;

use rand::Rng;
use tokio::time::Instant;

#[derive(Clone, Copy, Debug)]
pub struct RecoveryTimer {
    base: Duration,
    jitter: Duration,
    deadline: Option<Instant>,
}

impl RecoveryTimer {
    #[must_use]
    pub const fn new(base: Duration, jitter: Duration) -> Self {
        Self {
            base,
            jitter,
            deadline: None,
        }
    }

    /// Arms the timer for `base + rand(0..=jitter)` from `now`.
    ///
    /// Returns `false` and keeps the existing deadline if already armed.
    pub fn start(&mut self, now: Instant) -> bool {
        if self.deadline.is_some() {
            return false;
        }

        self.deadline = Some(now + self.delay());
        true
    }

    /// Disarms the timer. Returns whether it was armed.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }

    fn delay(&self) -> Duration {
        let jitter = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        if jitter == 0 {
            return self.base;
        }

        let extra = rand::thread_rng().gen_range(0..=jitter);
        self.base.saturating_add(Duration::from_millis(extra))
    }
}
