#[derive(Clone, Copy, Debug)]
pub struct ConfigHint {
    pub key: &'static str,
    pub description: &'static str,
}

pub const CONFIG_HINTS: &[ConfigHint] = &[
    ConfigHint {
        key: "reconciler.recovery_base_ms",
        description: "Minimum wait for a missing delta before forcing a resync, in milliseconds.",
    },
    ConfigHint {
        key: "reconciler.recovery_jitter_ms",
        description: "Upper bound of the random wait added to recovery_base_ms, in milliseconds. 0 disables jitter.",
    },
    ConfigHint {
        key: "reconciler.max_blocked_backlog",
        description: "Pending deltas tolerated while blocked before forcing a resync.",
    },
    ConfigHint {
        key: "reconciler.command_capacity",
        description: "Capacity of the reconciler task's command channel, at least 1.",
    },
];

/// The hint for `key`, if it is a known key.
#[must_use]
pub fn hint_for_key(key: &str) -> Option<&'static ConfigHint> {
    CONFIG_HINTS.iter().find(|hint| hint.key == key)
}
