//! Push transport.
//!
//! The transport owns the persistent connection and its reconnect policy.
//! Everything above it consumes a broadcast stream of [`EventEnvelope`]s;
//! transport lifecycle transitions are surfaced on the same stream as the
//! reserved `connect` / `disconnect` / `connect_error` envelopes, so the
//! connection manager only ever reflects what it observes.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};

use agora_core::event::{EVENT_CONNECT, EVENT_CONNECT_ERROR, EVENT_DISCONNECT};
use agora_core::{EventEnvelope, SyncError};

use crate::config::RealtimeConfig;

/// Capacity of the inbound event broadcast.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Abstraction over the push connection.
///
/// Exactly one implementation talks to the real server; tests substitute
/// their own. Reconnection after a drop is the implementation's own
/// responsibility.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the connection. Idempotence is not required; callers gate
    /// through the connection manager.
    async fn connect(&self) -> Result<(), SyncError>;

    /// Close the connection and stop reconnecting.
    async fn disconnect(&self);

    /// Send a named event to the server.
    async fn emit(&self, envelope: EventEnvelope) -> Result<(), SyncError>;

    /// Subscribe to the inbound event stream, lifecycle events included.
    fn events(&self) -> broadcast::Receiver<EventEnvelope>;
}

/// WebSocket transport with exponential-backoff reconnection.
pub struct WsTransport {
    config: RealtimeConfig,
    events_tx: broadcast::Sender<EventEnvelope>,
    outgoing_tx: Mutex<Option<mpsc::UnboundedSender<EventEnvelope>>>,
    shutdown_tx: Mutex<Option<watch::Sender<bool>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WsTransport {
    pub fn new(config: RealtimeConfig) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            events_tx,
            outgoing_tx: Mutex::new(None),
            shutdown_tx: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    fn lifecycle(&self, name: &str) {
        let _ = self.events_tx.send(EventEnvelope::new(name, json!(null)));
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self) -> Result<(), SyncError> {
        if self.task.lock().unwrap_or_else(|p| p.into_inner()).is_some() {
            return Err(SyncError::Transport("transport already running".into()));
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();

        *self.outgoing_tx.lock().unwrap_or_else(|p| p.into_inner()) = Some(outgoing_tx);
        *self.shutdown_tx.lock().unwrap_or_else(|p| p.into_inner()) = Some(shutdown_tx);

        let url = self.config.url.clone();
        let events_tx = self.events_tx.clone();
        let initial = self.config.reconnect_initial;
        let max = self.config.reconnect_max;

        let handle = tokio::spawn(async move {
            run_loop(url, events_tx, outgoing_rx, shutdown_rx, initial, max).await;
        });
        *self.task.lock().unwrap_or_else(|p| p.into_inner()) = Some(handle);

        Ok(())
    }

    async fn disconnect(&self) {
        if let Some(tx) = self
            .shutdown_tx
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
        {
            let _ = tx.send(true);
        }
        *self.outgoing_tx.lock().unwrap_or_else(|p| p.into_inner()) = None;
        let task = self.task.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(task) = task {
            let _ = task.await;
        }
        self.lifecycle(EVENT_DISCONNECT);
    }

    async fn emit(&self, envelope: EventEnvelope) -> Result<(), SyncError> {
        let tx = self
            .outgoing_tx
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        match tx {
            Some(tx) => tx
                .send(envelope)
                .map_err(|_| SyncError::Transport("connection task gone".into())),
            None => Err(SyncError::Transport("not connected".into())),
        }
    }

    fn events(&self) -> broadcast::Receiver<EventEnvelope> {
        self.events_tx.subscribe()
    }
}

/// Reconnection loop: connect, pump messages until the stream drops or a
/// shutdown is signalled, then back off and try again.
async fn run_loop(
    url: String,
    events_tx: broadcast::Sender<EventEnvelope>,
    mut outgoing_rx: mpsc::UnboundedReceiver<EventEnvelope>,
    mut shutdown_rx: watch::Receiver<bool>,
    initial: Duration,
    max: Duration,
) {
    let mut backoff = ExponentialBackoff {
        initial_interval: initial,
        max_interval: max,
        max_elapsed_time: None,
        ..Default::default()
    };

    loop {
        if *shutdown_rx.borrow() {
            info!("transport shutting down");
            return;
        }

        info!(url = %url, "connecting to push endpoint");
        match connect_async(url.as_str()).await {
            Ok((ws_stream, _)) => {
                backoff.reset();
                let _ = events_tx.send(EventEnvelope::new(EVENT_CONNECT, json!(null)));

                let (mut write, mut read) = ws_stream.split();
                loop {
                    tokio::select! {
                        biased;

                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() {
                                let _ = write.send(Message::Close(None)).await;
                                return;
                            }
                        }

                        Some(envelope) = outgoing_rx.recv() => {
                            match serde_json::to_string(&envelope) {
                                Ok(text) => {
                                    if let Err(e) = write.send(Message::Text(text.into())).await {
                                        warn!(error = %e, "write failed, reconnecting");
                                        break;
                                    }
                                }
                                Err(e) => warn!(error = %e, "unserializable outgoing event"),
                            }
                        }

                        msg = read.next() => {
                            match msg {
                                Some(Ok(Message::Text(text))) => {
                                    match serde_json::from_str::<EventEnvelope>(&text) {
                                        Ok(envelope) => {
                                            trace!(event = %envelope.name, "received push event");
                                            let _ = events_tx.send(envelope);
                                        }
                                        Err(e) => warn!(error = %e, "malformed push event"),
                                    }
                                }
                                Some(Ok(Message::Ping(_))) => {
                                    // tungstenite auto-responds to pings
                                    trace!("received ping");
                                }
                                Some(Ok(Message::Close(_))) => {
                                    info!("connection closed by server");
                                    break;
                                }
                                Some(Ok(_)) => {}
                                Some(Err(e)) => {
                                    warn!(error = %e, "read error, reconnecting");
                                    break;
                                }
                                None => {
                                    info!("stream ended, reconnecting");
                                    break;
                                }
                            }
                        }
                    }
                }

                let _ = events_tx.send(EventEnvelope::new(EVENT_DISCONNECT, json!(null)));
            }
            Err(e) => {
                warn!(error = %e, "connect failed");
                let _ = events_tx.send(EventEnvelope::new(EVENT_CONNECT_ERROR, json!(null)));
            }
        }

        let wait = backoff.next_backoff().unwrap_or(max);
        debug!(wait_secs = wait.as_secs(), "waiting before reconnect");
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    return;
                }
            }
            _ = tokio::time::sleep(wait) => {}
        }
    }
}
