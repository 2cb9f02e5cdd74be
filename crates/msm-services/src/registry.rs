//! Process Registry (C3, §4.3) — an in-memory map from server-id to a live
//! `ManagedChild`, and the three cooperating per-child tasks.
//!
//! Grounded on the teacher's `TerminalSessionManager` (`services/terminal_session.rs`):
//! a map of live handles guarded by a lock, with reader tasks fanning raw
//! bytes/lines into a broadcast channel. Generalized here to three tasks per
//! child (reader-out, reader-err, exit-watcher) driving a `ConsoleRing`
//! instead of a single PTY reader.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use msm_platform::SpawnedChild;
use msm_utils::console::{ConsoleLine, ConsoleRing, ConsoleStream};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tracing::{info, warn};

/// Invoked once per child exit, after the ring has recorded the system line
/// and the registry entry has been marked gone. Runs the exit-callback chain
/// (§4.5) — the Lifecycle Engine supplies this when it registers a child, so
/// this crate never depends on the supervisor crate that owns that chain.
pub type ExitHook =
    Arc<dyn Fn(i64, Option<i32>) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct ManagedChild {
    pub server_id: i64,
    pub pid: u32,
    pub ring: Arc<ConsoleRing>,
    stdin: AsyncMutex<tokio::process::ChildStdin>,
    exited: AtomicBool,
    last_activity: Mutex<Instant>,
    exit_code: tokio::sync::watch::Sender<Option<ExitSignal>>,
}

/// Distinguishes "no exit yet" (the watch channel's initial `None`) from
/// "exited with unknown code" (`Some(ExitSignal { code: None })`).
#[derive(Debug, Clone, Copy)]
pub struct ExitSignal {
    pub code: Option<i32>,
}

impl ManagedChild {
    pub fn is_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    /// A receiver that fires once, with the exit code, when this child
    /// terminates. Used by the console fabric to emit `ServerStopped`.
    pub fn subscribe_exit(&self) -> tokio::sync::watch::Receiver<Option<ExitSignal>> {
        self.exit_code.subscribe()
    }

    fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    fn idle_for(&self) -> std::time::Duration {
        self.last_activity.lock().elapsed()
    }

    /// Writes one line to the child's stdin, appending `\n` if absent, and
    /// echoes a `stdin-echo` entry into the ring. One write per call so
    /// concurrent commands never interleave mid-line.
    pub async fn send_command(&self, line: &str) -> std::io::Result<()> {
        let mut buf = line.to_string();
        if !buf.ends_with('\n') {
            buf.push('\n');
        }
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(buf.as_bytes()).await?;
        stdin.flush().await?;
        drop(stdin);
        self.ring.push(ConsoleLine::new(ConsoleStream::StdinEcho, line.trim_end_matches('\n')));
        self.touch();
        Ok(())
    }
}

#[derive(Default)]
pub struct ProcessRegistry {
    children: Mutex<HashMap<i64, Arc<ManagedChild>>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, server_id: i64) -> Option<Arc<ManagedChild>> {
        self.children.lock().get(&server_id).cloned()
    }

    pub fn is_registered(&self, server_id: i64) -> bool {
        self.children.lock().contains_key(&server_id)
    }

    pub fn pids(&self) -> Vec<(i64, u32)> {
        self.children.lock().iter().map(|(id, c)| (*id, c.pid)).collect()
    }

    fn remove(&self, server_id: i64) {
        self.children.lock().remove(&server_id);
    }

    /// Registers a freshly spawned child, starts its three I/O tasks, and
    /// returns the shared handle. `on_exit` is the exit-callback chain.
    pub fn register(
        self: &Arc<Self>,
        server_id: i64,
        spawned: SpawnedChild,
        on_exit: ExitHook,
    ) -> Arc<ManagedChild> {
        let (pid, stdout, stderr, stdin, exit) = spawned.into_parts();
        let (exit_tx, _) = tokio::sync::watch::channel(None);

        let child = Arc::new(ManagedChild {
            server_id,
            pid,
            ring: Arc::new(ConsoleRing::new()),
            stdin: AsyncMutex::new(stdin),
            exited: AtomicBool::new(false),
            last_activity: Mutex::new(Instant::now()),
            exit_code: exit_tx,
        });

        self.children.lock().insert(server_id, Arc::clone(&child));

        spawn_reader(Arc::clone(&child), stdout, ConsoleStream::Stdout);
        spawn_reader(Arc::clone(&child), stderr, ConsoleStream::Stderr);

        let registry = Arc::clone(self);
        let watched_child = Arc::clone(&child);
        tokio::spawn(async move {
            let exit_status = exit.wait().await;
            let exit_code = exit_status.ok().and_then(|s| s.code());

            watched_child.exited.store(true, Ordering::Release);
            watched_child.ring.push(ConsoleLine::new(
                ConsoleStream::System,
                format!(
                    "process exited with code {}",
                    exit_code.map(|c| c.to_string()).unwrap_or_else(|| "unknown".to_string())
                ),
            ));
            registry.remove(server_id);
            info!(server_id, pid, exit_code, "managed child exited");
            let _ = watched_child.exit_code.send(Some(ExitSignal { code: exit_code }));

            on_exit(server_id, exit_code).await;
        });

        child
    }

    /// Frees registry entries for children that have exited and whose ring
    /// has been idle past `ttl` (§4.3 dead-child sweep). Exited children are
    /// already removed from the map by the exit-watcher; this additionally
    /// drops long-idle-but-still-registered entries as a backstop against
    /// an exit-watcher that never observed termination (e.g. a process
    /// reparented out from under its process group).
    pub fn sweep_dead(&self, ttl: std::time::Duration) {
        let mut children = self.children.lock();
        let stale: Vec<i64> = children
            .iter()
            .filter(|(_, c)| c.is_exited() && c.idle_for() > ttl)
            .map(|(id, _)| *id)
            .collect();
        for id in stale {
            warn!(server_id = id, "sweeping dead child ring past TTL");
            children.remove(&id);
        }
    }
}

/// `\n`-based splitting (`AsyncBufReadExt::lines`) never terminates on a
/// bare `\r`, which progress-style Minecraft output (download bars, world
/// generation percentages) uses on its own. This hand-rolled splitter
/// treats `\n`, `\r\n`, and a lone `\r` all as line terminators.
fn spawn_reader<R>(child: Arc<ManagedChild>, mut reader: R, stream: ConsoleStream)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        let mut pending = Vec::new();
        let mut after_cr = false;

        loop {
            match reader.read(&mut buf).await {
                Ok(0) => {
                    if !pending.is_empty() {
                        push_line(&child, stream, &pending);
                    }
                    break;
                }
                Ok(n) => {
                    for &byte in &buf[..n] {
                        if after_cr {
                            after_cr = false;
                            if byte == b'\n' {
                                continue; // CRLF: the \r already closed the line
                            }
                        }
                        match byte {
                            b'\n' => {
                                push_line(&child, stream, &pending);
                                pending.clear();
                            }
                            b'\r' => {
                                push_line(&child, stream, &pending);
                                pending.clear();
                                after_cr = true;
                            }
                            other => pending.push(other),
                        }
                    }
                }
                Err(e) => {
                    warn!(server_id = child.server_id, error = %e, "console reader error");
                    break;
                }
            }
        }
    });
}

fn push_line(child: &Arc<ManagedChild>, stream: ConsoleStream, bytes: &[u8]) {
    child.ring.push(ConsoleLine::new(stream, String::from_utf8_lossy(bytes).into_owned()));
    child.touch();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registry_starts_empty_and_reports_unregistered_servers() {
        let registry = Arc::new(ProcessRegistry::new());
        assert!(!registry.is_registered(1));
        assert!(registry.get(1).is_none());
        assert!(registry.pids().is_empty());
    }

    #[tokio::test]
    async fn spawning_a_real_child_and_waiting_for_exit_fires_the_hook() {
        let registry = Arc::new(ProcessRegistry::new());
        let platform = msm_platform::current_backend();
        let spawned = platform
            .spawn(
                std::env::temp_dir().as_path(),
                &["/bin/sh".to_string(), "-c".to_string(), "echo hello; exit 3".to_string()],
                &Default::default(),
            )
            .await
            .unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let hook: ExitHook = Arc::new(move |server_id, code| {
            let tx = Arc::clone(&tx);
            Box::pin(async move {
                if let Some(tx) = tx.lock().take() {
                    let _ = tx.send((server_id, code));
                }
            })
        });

        let child = registry.register(42, spawned, hook);
        assert!(registry.is_registered(42));
        assert_eq!(child.pid, child.pid);

        let (server_id, code) = tokio::time::timeout(std::time::Duration::from_secs(5), rx)
            .await
            .expect("exit hook should fire")
            .unwrap();
        assert_eq!(server_id, 42);
        assert_eq!(code, Some(3));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!registry.is_registered(42));
    }

    #[tokio::test]
    async fn a_bare_carriage_return_terminates_a_line_like_newline_does() {
        let registry = Arc::new(ProcessRegistry::new());
        let platform = msm_platform::current_backend();
        let spawned = platform
            .spawn(
                std::env::temp_dir().as_path(),
                &[
                    "/bin/sh".to_string(),
                    "-c".to_string(),
                    "printf 'downloading 1%%\\rdownloading 50%%\\rdone\\n'".to_string(),
                ],
                &Default::default(),
            )
            .await
            .unwrap();

        let hook: ExitHook = Arc::new(|_, _| Box::pin(async {}));
        let child = registry.register(7, spawned, hook);

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        let lines: Vec<String> = child.ring.history().into_iter().map(|l| l.text).collect();
        assert_eq!(lines, vec!["downloading 1%", "downloading 50%", "done"]);
    }
}
