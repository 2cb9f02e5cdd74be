//! Platform Backend (C1, §4.1).
//!
//! Grounded on `crates/local-deployment/src/command.rs` (process-group
//! signaling via `nix`+`command-group`) and
//! `crates/services/src/services/process_inspector/sysinfo_impl.rs`
//! (`sysinfo`-backed liveness/cpu/mem). The backend is selected once at
//! process start from `std::env::consts::OS`; callers hold it behind
//! `Arc<dyn PlatformBackend>`.

pub mod inspector;
pub mod port;
pub mod runtime_discovery;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::{ChildStderr, ChildStdin, ChildStdout};

pub use inspector::ProcessSnapshot;
pub use port::PortCheck;
pub use runtime_discovery::DiscoveredRuntime;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("failed to spawn process: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("failed to signal process {pid}: {source}")]
    Signal { pid: u32, #[source] source: std::io::Error },
    #[error("process {0} not found")]
    NotFound(u32),
}

/// A child handle split into its four usable parts (spawn's logical
/// `{pid, stdout-stream, stderr-stream, stdin-sink, exit-future}`). The
/// underlying process-group handle is retained internally only so `wait()`
/// can observe the exit future; out-of-band signaling goes through the
/// backend by pid, not through this struct.
pub struct SpawnedChild {
    pub pid: u32,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
    pub stdin: ChildStdin,
    group_child: command_group::AsyncGroupChild,
}

impl SpawnedChild {
    pub async fn wait(&mut self) -> std::io::Result<std::process::ExitStatus> {
        self.group_child.wait().await
    }

    /// Splits the handle into its owned stdio streams plus a separate
    /// `ChildExit` for awaiting termination. Needed because callers that
    /// move `stdout`/`stderr`/`stdin` into independent reader tasks can no
    /// longer hold `&mut self` to call `wait()` on the original value — this
    /// carries the process-group handle into its own owned value instead.
    pub fn into_parts(self) -> (u32, ChildStdout, ChildStderr, ChildStdin, ChildExit) {
        (self.pid, self.stdout, self.stderr, self.stdin, ChildExit { group_child: self.group_child })
    }
}

/// The exit-future half of a split `SpawnedChild`.
pub struct ChildExit {
    group_child: command_group::AsyncGroupChild,
}

impl ChildExit {
    pub async fn wait(mut self) -> std::io::Result<std::process::ExitStatus> {
        self.group_child.wait().await
    }
}

#[async_trait]
pub trait PlatformBackend: Send + Sync {
    /// Spawn `argv[0]` with the remaining args, in `working_directory`, with
    /// the supervisor's own environment merged with `env_overlay` (never a
    /// bare map: `PATH`/`JAVA_HOME` etc. must survive).
    async fn spawn(
        &self,
        working_directory: &Path,
        argv: &[String],
        env_overlay: &HashMap<String, String>,
    ) -> Result<SpawnedChild, PlatformError>;

    /// POSIX: SIGTERM. Windows: best-effort soft terminate; callers are
    /// expected to have already attempted the `"stop"` stdin command through
    /// the console fabric before escalating here.
    async fn signal_graceful(&self, pid: u32) -> Result<(), PlatformError>;

    /// POSIX: SIGKILL. Windows: `taskkill /T /F`.
    async fn signal_force(&self, pid: u32) -> Result<(), PlatformError>;

    /// Consults the OS process table; must stay in the tens-of-milliseconds
    /// range (no full system refresh).
    async fn is_alive(&self, pid: u32) -> bool;

    fn discover_runtimes(&self) -> Vec<DiscoveredRuntime> {
        runtime_discovery::discover()
    }

    fn free_port(&self, tcp_port: u16) -> PortCheck {
        port::check(tcp_port)
    }

    fn data_root(&self) -> PathBuf {
        msm_utils::paths::data_root()
    }
}

/// Select the concrete backend for the current OS, once, at process start.
pub fn current_backend() -> Arc<dyn PlatformBackend> {
    #[cfg(unix)]
    {
        Arc::new(unix::UnixBackend::new())
    }
    #[cfg(windows)]
    {
        Arc::new(windows::WindowsBackend::new())
    }
}

/// Environment merge helper shared by both backends: the supervisor's own
/// environment plus the caller's additions, additions taking precedence.
fn merged_env(overlay: &HashMap<String, String>) -> HashMap<String, String> {
    let mut env: HashMap<String, String> = std::env::vars().collect();
    for (k, v) in overlay {
        env.insert(k.clone(), v.clone());
    }
    env
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_env_preserves_path_and_applies_overlay() {
        let overlay = HashMap::from([("MSM_TEST_KEY".to_string(), "value".to_string())]);
        let merged = merged_env(&overlay);
        assert!(merged.contains_key("PATH") || std::env::var("PATH").is_err());
        assert_eq!(merged.get("MSM_TEST_KEY"), Some(&"value".to_string()));
    }

    #[test]
    fn merged_env_overlay_overrides_existing_key() {
        unsafe { std::env::set_var("MSM_OVERRIDE_TEST", "original") };
        let overlay = HashMap::from([("MSM_OVERRIDE_TEST".to_string(), "overridden".to_string())]);
        let merged = merged_env(&overlay);
        unsafe { std::env::remove_var("MSM_OVERRIDE_TEST") };
        assert_eq!(merged.get("MSM_OVERRIDE_TEST"), Some(&"overridden".to_string()));
    }
}
