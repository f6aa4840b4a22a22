//! Reconciler tuning with named defaults.

use core::time::Duration;

use serde::{Deserialize, Serialize};

/// Default minimum time a blocked reconciler waits for a missing delta (10 seconds)
pub const DEFAULT_RECOVERY_BASE_MS: u64 = 10_000;

/// Default upper bound of the random extra wait on top of the base (5 seconds)
/// Spreads resync requests of many blocked clients over time
pub const DEFAULT_RECOVERY_JITTER_MS: u64 = 5_000;

/// Default number of pending deltas tolerated while blocked
pub const DEFAULT_MAX_BLOCKED_BACKLOG: usize = 5;

/// Default capacity of the runtime driver's command channel
pub const DEFAULT_COMMAND_CAPACITY: usize = 256;

/// Reconciler configuration.
///
/// Controls the desync recovery policy and the async driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Guaranteed wait before a blocked reconciler gives up
    #[serde(rename = "recovery_base_ms", with = "serde_duration")]
    pub recovery_base: Duration,

    /// Maximum random wait added to `recovery_base`
    #[serde(rename = "recovery_jitter_ms", with = "serde_duration")]
    pub recovery_jitter: Duration,

    /// Pending deltas above which a blocked reconciler desyncs immediately
    pub max_blocked_backlog: usize,

    /// Commands buffered by the runtime driver before `submit` waits
    pub command_capacity: usize,
}

impl ReconcilerConfig {
    /// The longest a blocked reconciler can wait before it forces a desync.
    #[must_use]
    pub fn max_recovery_wait(&self) -> Duration {
        self.recovery_base.saturating_add(self.recovery_jitter)
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            recovery_base: Duration::from_millis(DEFAULT_RECOVERY_BASE_MS),
            recovery_jitter: Duration::from_millis(DEFAULT_RECOVERY_JITTER_MS),
            max_blocked_backlog: DEFAULT_MAX_BLOCKED_BACKLOG,
            command_capacity: DEFAULT_COMMAND_CAPACITY,
        }
    }
}

mod serde_duration {
    use core::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
