//! POSIX backend: process groups via `command-group`, signaling via `nix`.
//!
//! Grounded directly on `crates/local-deployment/src/command.rs`
//! (`kill_process_group`: resolve the process group id, send
//! SIGTERM/SIGKILL, wait briefly between escalations).

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use command_group::AsyncCommandGroup;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::{getpgid, Pid};
use tokio::process::Command;

use crate::{inspector, merged_env, PlatformBackend, PlatformError, SpawnedChild};

pub struct UnixBackend;

impl UnixBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for UnixBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn send_signal(pid: u32, signal: Signal) -> Result<(), PlatformError> {
    let pgid = getpgid(Some(Pid::from_raw(pid as i32))).map_err(|e| PlatformError::Signal {
        pid,
        source: std::io::Error::other(e),
    })?;
    killpg(pgid, signal).map_err(|e| PlatformError::Signal {
        pid,
        source: std::io::Error::other(e),
    })
}

#[async_trait]
impl PlatformBackend for UnixBackend {
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

    async fn signal_graceful(&self, pid: u32) -> Result<(), PlatformError> {
        send_signal(pid, Signal::SIGTERM)
    }

    async fn signal_force(&self, pid: u32) -> Result<(), PlatformError> {
        send_signal(pid, Signal::SIGKILL)
    }

    async fn is_alive(&self, pid: u32) -> bool {
        // nix::sys::signal::kill with signal 0 probes existence without
        // actually signaling, and is far cheaper than a sysinfo refresh.
        nix::sys::signal::kill(Pid::from_raw(pid as i32), None).is_ok() || inspector::is_alive(pid)
    }
}
