use std::collections::BTreeMap;
use std::fs::{read_to_string, write};

use camino::Utf8Path;
use eyre::{Result as EyreResult, WrapErr};
use serde::{Deserialize, Serialize};
use sessync_reconciler::ReconcilerConfig;

pub mod hints;

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[non_exhaustive]
pub struct ConfigFile {
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
}

impl ConfigFile {
    #[must_use]
    pub const fn new(reconciler: ReconcilerConfig) -> Self {
        Self { reconciler }
    }

    #[must_use]
    pub fn exists(dir: &Utf8Path) -> bool {
        dir.join(CONFIG_FILE).is_file()
    }

    pub fn load(dir: &Utf8Path) -> EyreResult<Self> {
        let path = dir.join(CONFIG_FILE);
        let content = read_to_string(&path)
            .wrap_err_with(|| format!("failed to read configuration from {path:?}"))?;

        toml::from_str(&content)
            .wrap_err_with(|| format!("failed to parse configuration from {path:?}"))
    }

    pub fn save(&self, dir: &Utf8Path) -> EyreResult<()> {
        let path = dir.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)?;

        write(&path, content)
            .wrap_err_with(|| format!("failed to write configuration to {path:?}"))?;

        Ok(())
    }

    /// Only write config file if changes are detected
    pub fn save_if_changed(&self, dir: &Utf8Path) -> EyreResult<bool> {
        let path = dir.join(CONFIG_FILE);
        let new_content = toml::to_string_pretty(self)?;

        let changed = read_to_string(&path).map_or(true, |existing| existing != new_content);

        if changed {
            write(&path, new_content)
                .wrap_err_with(|| format!("failed to write configuration to {path:?}"))?;
        }

        Ok(changed)
    }

    /// Provide editable keys with example values
    #[must_use]
    pub fn editable_keys() -> BTreeMap<&'static str, Vec<&'static str>> {
        let mut map = BTreeMap::new();

        let _ = map.insert("reconciler.recovery_base_ms", vec!["5000", "10000", "30000"]);
        let _ = map.insert("reconciler.recovery_jitter_ms", vec!["0", "2500", "5000"]);
        let _ = map.insert("reconciler.max_blocked_backlog", vec!["1", "5", "20"]);
        let _ = map.insert("reconciler.command_capacity", vec!["64", "256", "1024"]);

        map
    }

    /// Get the value for a specific config key
    #[must_use]
    pub fn get_value(&self, key: &str) -> Option<String> {
        let reconciler = &self.reconciler;

        match key {
            "reconciler.recovery_base_ms" => Some(reconciler.recovery_base.as_millis().to_string()),
            "reconciler.recovery_jitter_ms" => {
                Some(reconciler.recovery_jitter.as_millis().to_string())
            }
            "reconciler.max_blocked_backlog" => Some(reconciler.max_blocked_backlog.to_string()),
            "reconciler.command_capacity" => Some(reconciler.command_capacity.to_string()),
            _ => None,
        }
    }
}
