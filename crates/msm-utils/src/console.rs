//! Per-server console ring buffer and subscriber fan-out (§4.3).
//!
//! Generalized from the teacher's `MsgStore` (`crates/utils/src/msg_store.rs`),
//! which bounds its history by total bytes. This spec bounds the ring by
//! *line count* instead (`ConsoleRing::with_capacity`, default 2000),
//! matching "a bounded ring of the last N console lines" verbatim.

use std::collections::VecDeque;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

pub const DEFAULT_RING_CAPACITY: usize = 2000;

/// Which descriptor (or synthetic source) a console line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleStream {
    Stdout,
    Stderr,
    StdinEcho,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleLine {
    pub timestamp: DateTime<Utc>,
    pub stream: ConsoleStream,
    pub text: String,
}

impl ConsoleLine {
    pub fn new(stream: ConsoleStream, text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            stream,
            text: text.into(),
        }
    }
}

struct Inner {
    history: VecDeque<ConsoleLine>,
    capacity: usize,
}

/// Bounded ring of console lines plus a broadcast channel for live tailing.
///
/// `push` and `subscribe` both hold the ring's write/read lock for their
/// entire append-and-broadcast or subscribe-and-snapshot sequence, so the
/// two can never interleave: a `subscribe()` either completes entirely
/// before a racing `push()` starts (and so receives that line live) or
/// entirely after it (and so sees it already in the snapshot) — never a mix
/// that loses or duplicates the line between the `history` frame and the
/// first `output` frame (Testable Property 7).
pub struct ConsoleRing {
    inner: RwLock<Inner>,
    sender: broadcast::Sender<ConsoleLine>,
}

impl ConsoleRing {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_RING_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(4096);
        Self {
            inner: RwLock::new(Inner {
                history: VecDeque::with_capacity(capacity.min(256)),
                capacity,
            }),
            sender,
        }
    }

    /// Append a line, evicting the oldest line if the ring is full, then
    /// broadcast it — all under the write lock `subscribe()` takes to
    /// snapshot, so the two can't tear.
    pub fn push(&self, line: ConsoleLine) {
        let mut inner = self.inner.write().unwrap();
        if inner.history.len() >= inner.capacity {
            inner.history.pop_front();
        }
        inner.history.push_back(line.clone());
        let _ = self.sender.send(line);
    }

    pub fn history(&self) -> Vec<ConsoleLine> {
        self.inner.read().unwrap().history.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot the ring and return a live receiver for everything inserted
    /// from this point on. Callers should send `history()` as one frame and
    /// then forward items from the receiver as they arrive. Holds the same
    /// lock `push()` holds for its append-then-broadcast, so no push can be
    /// half-done while this snapshots.
    pub fn subscribe(&self) -> (Vec<ConsoleLine>, broadcast::Receiver<ConsoleLine>) {
        let inner = self.inner.read().unwrap();
        let rx = self.sender.subscribe();
        let history = inner.history.iter().cloned().collect();
        (history, rx)
    }

    pub fn live_stream(
        &self,
    ) -> BroadcastStream<ConsoleLine> {
        BroadcastStream::new(self.sender.subscribe())
    }
}

impl Default for ConsoleRing {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_when_full() {
        let ring = ConsoleRing::with_capacity(3);
        for i in 0..5 {
            ring.push(ConsoleLine::new(ConsoleStream::Stdout, format!("line{i}")));
        }
        let history = ring.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].text, "line2");
        assert_eq!(history[2].text, "line4");
    }

    #[tokio::test]
    async fn subscribe_then_push_preserves_order_for_multiple_subscribers() {
        let ring = ConsoleRing::with_capacity(100);
        ring.push(ConsoleLine::new(ConsoleStream::System, "boot"));

        let (hist_a, mut rx_a) = ring.subscribe();
        let (hist_b, mut rx_b) = ring.subscribe();
        assert_eq!(hist_a.last().unwrap().text, "boot");
        assert_eq!(hist_b.last().unwrap().text, "boot");

        for i in 0..5 {
            ring.push(ConsoleLine::new(ConsoleStream::Stdout, format!("l{i}")));
        }

        for i in 0..5 {
            let a = rx_a.recv().await.unwrap();
            let b = rx_b.recv().await.unwrap();
            assert_eq!(a.text, format!("l{i}"));
            assert_eq!(b.text, format!("l{i}"));
        }
    }
}
