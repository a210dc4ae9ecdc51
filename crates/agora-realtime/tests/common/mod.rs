//! In-memory transport double for connection and channel tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::broadcast;

use agora_core::event::EVENT_CONNECT;
use agora_core::{EventEnvelope, SyncError};
use agora_realtime::Transport;

/// Transport double. Inbound events are injected with [`FakeTransport::push`];
/// outbound events are recorded for assertion.
pub struct FakeTransport {
    events_tx: broadcast::Sender<EventEnvelope>,
    sent: Mutex<Vec<EventEnvelope>>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    /// Whether `connect()` immediately reports the connection as open.
    auto_open: bool,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::with_auto_open(true)
    }

    /// A transport whose handshake never completes, for gating tests.
    pub fn stalled() -> Self {
        Self::with_auto_open(false)
    }

    fn with_auto_open(auto_open: bool) -> Self {
        let (events_tx, _) = broadcast::channel(64);
        Self {
            events_tx,
            sent: Mutex::new(Vec::new()),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            auto_open,
        }
    }

    /// Inject an inbound event as if the server pushed it.
    pub fn push(&self, name: &str, payload: serde_json::Value) {
        let _ = self.events_tx.send(EventEnvelope::new(name, payload));
    }

    pub fn sent(&self) -> Vec<EventEnvelope> {
        self.sent.lock().expect("sent lock poisoned").clone()
    }

    pub fn sent_named(&self, name: &str) -> Vec<EventEnvelope> {
        self.sent()
            .into_iter()
            .filter(|e| e.name == name)
            .collect()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn connect(&self) -> Result<(), SyncError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.auto_open {
            self.push(EVENT_CONNECT, json!(null));
        }
        Ok(())
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }

    async fn emit(&self, envelope: EventEnvelope) -> Result<(), SyncError> {
        self.sent.lock().expect("sent lock poisoned").push(envelope);
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<EventEnvelope> {
        self.events_tx.subscribe()
    }
}

/// Let the dispatch task drain everything injected so far.
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
}
