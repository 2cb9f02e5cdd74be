//! Windows backend: job-object-style grouping via `command-group`'s
//! `CREATE_NO_WINDOW`/job assignment, signaling via `taskkill`.
//!
//! `command-group`'s Windows implementation already assigns spawned
//! processes to a job object so a single `.kill()` fans out to children;
//! this backend layers the spec's graceful/force distinction on top.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use command_group::AsyncCommandGroup;
use tokio::process::Command;

use crate::{inspector, merged_env, PlatformBackend, PlatformError, SpawnedChild};

pub struct WindowsBackend;

impl WindowsBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WindowsBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformBackend for WindowsBackend {
    async fn spawn(
        &self,
        working_directory: &Path,
        argv: &[String],
        env_overlay: &HashMap<String, String>,
    ) -> Result<SpawnedChild, PlatformError> {
        let (program, args) = argv.split_first().ok_or_else(|| {
            PlatformError::Spawn(std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty argv"))
        })?;

        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(working_directory)
            .envs(merged_env(env_overlay))
            .kill_on_drop(true)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut group_child = command.group_spawn().map_err(PlatformError::Spawn)?;
        let inner = group_child.inner();
        let pid = inner.id().ok_or_else(|| {
            PlatformError::Spawn(std::io::Error::other("child exited before pid could be read"))
        })?;
        let stdin = inner.stdin.take().expect("piped stdin");
        let stdout = inner.stdout.take().expect("piped stdout");
        let stderr = inner.stderr.take().expect("piped stderr");

        Ok(SpawnedChild { pid, stdout, stderr, stdin, group_child })
    }

    /// No portable "soft terminate by pid" primitive exists on Windows; the
    /// Lifecycle Engine already sends the `"stop"` stdin command before
    /// escalating to this call, so this is a short grace window followed by
    /// the same force path if the process is still alive.
    async fn signal_graceful(&self, pid: u32) -> Result<(), PlatformError> {
        if !self.is_alive(pid).await {
            return Ok(());
        }
        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
        if self.is_alive(pid).await {
            self.signal_force(pid).await
        } else {
            Ok(())
        }
    }

    async fn signal_force(&self, pid: u32) -> Result<(), PlatformError> {
        let status = tokio::task::spawn_blocking(move || {
            std::process::Command::new("taskkill").args(["/PID", &pid.to_string(), "/T", "/F"]).status()
        })
        .await
        .map_err(|e| PlatformError::Signal { pid, source: std::io::Error::other(e.to_string()) })?
        .map_err(|e| PlatformError::Signal { pid, source: e })?;

        if status.success() {
            Ok(())
        } else {
            Err(PlatformError::NotFound(pid))
        }
    }

    async fn is_alive(&self, pid: u32) -> bool {
        inspector::is_alive(pid)
    }
}
