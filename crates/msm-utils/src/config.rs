//! On-disk `config.json` (§6 External Interfaces).
//!
//! Grounded on the teacher's `services::services::config::load_config_from_file`
//! / `save_config_to_file` pair, minus the teacher's schema-versioning
//! machinery (`versions::v8`..`v11` with migration-on-load) — this crate has
//! exactly one config shape so far and nothing to migrate from yet.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::paths;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub default_heap_size: String,
    pub stop_grace_seconds: u64,
    pub reconcile_interval_seconds: u64,
    pub console_ring_capacity: usize,
    pub host: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_heap_size: "2G".to_string(),
            stop_grace_seconds: 30,
            reconcile_interval_seconds: 10,
            console_ring_capacity: msm_utils_console_default_capacity(),
            host: "127.0.0.1".to_string(),
            port: 0,
        }
    }
}

fn msm_utils_console_default_capacity() -> usize {
    crate::console::DEFAULT_RING_CAPACITY
}

/// Always returns a usable config: missing or unreadable file falls back to
/// defaults rather than failing startup.
pub fn load_or_default(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "config.json is not valid JSON, using defaults");
            Config::default()
        }),
        Err(_) => {
            tracing::info!("no config.json found, using defaults");
            Config::default()
        }
    }
}

pub fn save(config: &Config, path: &Path) -> Result<(), ConfigError> {
    let raw = serde_json::to_string_pretty(config)?;
    std::fs::write(path, raw)?;
    Ok(())
}

/// Convenience wrapper over [`load_or_default`] using the standard
/// `config.json` location under the data root.
pub fn load() -> Config {
    load_or_default(&paths::config_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn missing_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = load_or_default(&tmp.path().join("config.json"));
        assert_eq!(config.default_heap_size, "2G");
        assert_eq!(config.port, 0);
    }

    #[test]
    #[serial]
    fn save_then_load_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        let mut config = Config::default();
        config.port = 25500;
        config.default_heap_size = "4G".to_string();
        save(&config, &path).unwrap();

        let loaded = load_or_default(&path);
        assert_eq!(loaded.port, 25500);
        assert_eq!(loaded.default_heap_size, "4G");
    }

    #[test]
    #[serial]
    fn garbage_file_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        let config = load_or_default(&path);
        assert_eq!(config.stop_grace_seconds, 30);
    }
}
