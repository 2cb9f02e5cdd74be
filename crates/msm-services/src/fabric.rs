//! Console Fabric (C4, §4.3, §6 wire protocol) — the frame-level layer on
//! top of a `ManagedChild`'s `ConsoleRing`: `history`/`output`/`heartbeat`/
//! `command_ack`/`server_stopped`/`error` frames, one `mpsc` sink per
//! subscriber so a lagging subscriber never blocks another.
//!
//! Grounded on the teacher's `TerminalSessionManager::subscribe` (a
//! `broadcast::Receiver<TerminalOutput>` per caller) generalized to a richer
//! frame enum and a bounded per-subscriber channel so backpressure can be
//! observed and acted on (Testable Property 8), which a `broadcast` channel
//! alone cannot express cleanly (a lagged receiver just skips messages).

use std::sync::Arc;
use std::time::Duration;

use msm_utils::console::{ConsoleLine, ConsoleRing};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::warn;

use crate::registry::ManagedChild;

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);
pub const DEFAULT_SINK_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    History { lines: Vec<ConsoleLine> },
    Output { data: ConsoleLine },
    Heartbeat,
    CommandAck { success: bool, command: String, message: Option<String> },
    ServerStopped { exit_code: Option<i32> },
    Error { message: String },
}

pub struct Subscription {
    pub frames: mpsc::Receiver<Frame>,
    pub pong: PongSink,
}

/// Shared with the route handler so it can record a client's `pong` reply
/// without threading the heartbeat loop's state through the WebSocket task.
#[derive(Clone)]
pub struct PongSink(Arc<Mutex<Instant>>);

impl PongSink {
    pub fn mark(&self) {
        *self.0.lock() = Instant::now();
    }
}

/// Subscribes to `child`'s console: first a `History` frame of the current
/// ring contents, then `Output` frames as new lines arrive, plus periodic
/// `Heartbeat` frames. The returned channel is bounded and uses `try_send`
/// so a subscriber that stops draining it is disconnected (channel closed)
/// rather than stalling the fan-out for everyone else. A subscriber that
/// drains fine but never replies to two consecutive heartbeats (§4.3) is
/// disconnected independently of backpressure, via `pong`.
pub fn subscribe(child: Arc<ManagedChild>) -> Subscription {
    let (tx, rx) = mpsc::channel(DEFAULT_SINK_CAPACITY);
    let ring: Arc<ConsoleRing> = Arc::clone(&child.ring);
    let (history, mut live) = ring.subscribe();
    let mut exit_rx = child.subscribe_exit();
    let last_pong = Arc::new(Mutex::new(Instant::now()));
    let pong = PongSink(Arc::clone(&last_pong));

    if tx.try_send(Frame::History { lines: history }).is_err() {
        warn!(server_id = child.server_id, "subscriber disconnected before history frame was sent");
    }

    tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(DEFAULT_HEARTBEAT_INTERVAL);
        heartbeat.tick().await; // first tick fires immediately; skip it

        loop {
            tokio::select! {
                line = live.recv() => {
                    match line {
                        Ok(line) => {
                            if tx.try_send(Frame::Output { data: line }).is_err() {
                                warn!(server_id = child.server_id, "subscriber lagging, disconnecting");
                                break;
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = heartbeat.tick() => {
                    if last_pong.lock().elapsed() > DEFAULT_HEARTBEAT_INTERVAL * 2 {
                        warn!(server_id = child.server_id, "subscriber missed two heartbeats, disconnecting");
                        break;
                    }
                    if tx.try_send(Frame::Heartbeat).is_err() {
                        warn!(server_id = child.server_id, "subscriber lagging on heartbeat, disconnecting");
                        break;
                    }
                }
                Ok(()) = exit_rx.changed() => {
                    if let Some(signal) = *exit_rx.borrow() {
                        let _ = tx.try_send(Frame::ServerStopped { exit_code: signal.code });
                    }
                    break;
                }
                _ = tx.closed() => break,
            }
        }
    });

    Subscription { frames: rx, pong }
}

/// Sends an operator command through the child's stdin and returns the
/// `CommandAck` frame the fabric sends back to the originating sink only.
pub async fn send_command(child: &ManagedChild, command: &str) -> Frame {
    match child.send_command(command).await {
        Ok(()) => Frame::CommandAck { success: true, command: command.to_string(), message: None },
        Err(e) => {
            Frame::CommandAck { success: false, command: command.to_string(), message: Some(e.to_string()) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msm_platform::current_backend;

    #[tokio::test]
    async fn subscriber_receives_history_then_output_frames() {
        let platform = current_backend();
        let spawned = platform
            .spawn(
                std::env::temp_dir().as_path(),
                &[
                    "/bin/sh".to_string(),
                    "-c".to_string(),
                    "echo one; sleep 0.1; echo two; sleep 5".to_string(),
                ],
                &Default::default(),
            )
            .await
            .unwrap();

        let registry = Arc::new(crate::registry::ProcessRegistry::new());
        let hook: crate::registry::ExitHook = Arc::new(|_, _| Box::pin(async {}));
        let child = registry.register(1, spawned, hook);

        tokio::time::sleep(Duration::from_millis(200)).await;

        let mut sub = subscribe(Arc::clone(&child));
        let first = sub.frames.recv().await.unwrap();
        assert!(matches!(first, Frame::History { .. }));

        // Further output lines (if any arrived after the snapshot) should be
        // well-formed Output frames, not interleave with History.
        if let Ok(Some(frame)) =
            tokio::time::timeout(Duration::from_millis(500), sub.frames.recv()).await
        {
            assert!(matches!(frame, Frame::Output { .. } | Frame::Heartbeat));
        }
    }
}
