//! Single-daemon instance registry (§2.2 supplemented features).
//!
//! Simplified from the teacher's `utils::port_file::InstanceRegistry`, which
//! tracks many concurrent per-project instances keyed by a hash of the
//! project root. This supervisor is one daemon per data root, so the
//! registry collapses to a single `instance.json` file under the data root
//! recording the daemon's pid and bound port — enough for the CLI to find
//! the daemon and for a second daemon launch to detect a live instance
//! instead of silently double-binding the same SQLite database.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::paths;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub pid: u32,
    pub port: u16,
    pub started_at: DateTime<Utc>,
}

fn instance_path() -> PathBuf {
    paths::data_root().join("instance.json")
}

impl InstanceInfo {
    pub fn new(port: u16) -> Self {
        Self { pid: std::process::id(), port, started_at: Utc::now() }
    }

    pub fn is_running(&self) -> bool {
        is_pid_alive(self.pid)
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }
}

#[cfg(unix)]
fn is_pid_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(unix))]
fn is_pid_alive(_pid: u32) -> bool {
    true
}

pub async fn register(info: &InstanceInfo) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(info)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    tokio::fs::write(instance_path(), json).await
}

pub async fn unregister() -> std::io::Result<()> {
    let path = instance_path();
    if tokio::fs::try_exists(&path).await? {
        tokio::fs::remove_file(&path).await?;
    }
    Ok(())
}

/// The currently registered instance, if its file exists and its pid is
/// still alive. A stale file (pid gone) is treated as "no instance".
pub async fn current() -> Option<InstanceInfo> {
    let content = tokio::fs::read_to_string(instance_path()).await.ok()?;
    let info: InstanceInfo = serde_json::from_str(&content).ok()?;
    info.is_running().then_some(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[tokio::test]
    #[serial]
    async fn register_then_current_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        unsafe { std::env::set_var("MSM_DATA_DIR", tmp.path()) };

        let info = InstanceInfo::new(25501);
        register(&info).await.unwrap();

        let found = current().await.unwrap();
        assert_eq!(found.port, 25501);
        assert_eq!(found.pid, std::process::id());

        unregister().await.unwrap();
        assert!(current().await.is_none());

        unsafe { std::env::remove_var("MSM_DATA_DIR") };
    }

    #[tokio::test]
    #[serial]
    async fn current_is_none_when_pid_is_not_alive() {
        let tmp = tempfile::tempdir().unwrap();
        unsafe { std::env::set_var("MSM_DATA_DIR", tmp.path()) };

        let info = InstanceInfo { pid: 999_999_999, port: 1, started_at: Utc::now() };
        register(&info).await.unwrap();
        assert!(current().await.is_none());

        unsafe { std::env::remove_var("MSM_DATA_DIR") };
    }
}
