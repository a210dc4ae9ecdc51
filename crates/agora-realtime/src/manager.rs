//! Connection manager.
//!
//! Owns the lifecycle state machine over an injected [`Transport`] and a
//! registry of named event handlers. The manager never reconnects by
//! itself; the transport does, and the manager only reflects what the
//! transport's lifecycle events tell it. Auth failures reported by the
//! server force a disconnect and are surfaced for the caller to act on;
//! the manager never retries authentication.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::{Value, json};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use agora_core::event::{
    EVENT_CONNECT, EVENT_CONNECT_ERROR, EVENT_DISCONNECT,
};
use agora_core::{EventEnvelope, SyncError};

use crate::transport::Transport;

/// Control message asking the server to route a room's events to us.
pub const EVENT_JOIN_ROOM: &str = "join_room";
/// Control message asking the server to stop routing a room's events.
pub const EVENT_LEAVE_ROOM: &str = "leave_room";

/// Connection lifecycle state, observable through a `watch` channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Callback invoked for every event matching a registered name.
pub type Handler = Arc<dyn Fn(&EventEnvelope) + Send + Sync>;

/// A room is pending from the moment `join` claims it until the join
/// message is actually sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoomStatus {
    Pending,
    Joined,
}

/// Opaque token identifying one registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(Uuid);

impl HandlerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Lifecycle manager for the push connection.
///
/// One instance exists per authenticated session. All registered handlers
/// and joined rooms are cleared on any disconnect, explicit or not, so
/// nothing leaks across sessions.
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    state_tx: watch::Sender<ConnectionState>,
    handlers: DashMap<String, Vec<(HandlerId, Handler)>>,
    rooms: DashMap<String, RoomStatus>,
    authenticated: AtomicBool,
    last_error: Mutex<Option<SyncError>>,
    dispatch: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn Transport>) -> Arc<Self> {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Arc::new(Self {
            transport,
            state_tx,
            handlers: DashMap::new(),
            rooms: DashMap::new(),
            authenticated: AtomicBool::new(false),
            last_error: Mutex::new(None),
            dispatch: Mutex::new(None),
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Mark the session authenticated or not. Dropping to unauthenticated
    /// while connected forces a disconnect and tears everything down.
    pub async fn set_authenticated(self: &Arc<Self>, authenticated: bool) {
        let was = self.authenticated.swap(authenticated, Ordering::SeqCst);
        if was && !authenticated {
            info!("session ended, disconnecting");
            self.disconnect().await;
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    /// Open the connection.
    ///
    /// No-op while already connecting or connected, and while the session
    /// is unauthenticated. At most one transport connect is issued per
    /// transition out of `Disconnected`/`Error`.
    pub async fn connect(self: &Arc<Self>) -> Result<(), SyncError> {
        if !self.is_authenticated() {
            debug!("connect ignored: not authenticated");
            return Ok(());
        }

        let transitioned = self.state_tx.send_if_modified(|state| {
            if matches!(
                state,
                ConnectionState::Disconnected | ConnectionState::Error
            ) {
                *state = ConnectionState::Connecting;
                true
            } else {
                false
            }
        });
        if !transitioned {
            debug!(state = ?self.state(), "connect ignored: already in progress");
            return Ok(());
        }

        // Subscribe before the handshake so the `connect` event is not missed.
        let events = self.transport.events();
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            this.dispatch(events).await;
        });
        if let Some(old) = self
            .dispatch
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .replace(handle)
        {
            old.abort();
        }

        if let Err(e) = self.transport.connect().await {
            warn!(error = %e, "transport connect failed");
            self.state_tx.send_replace(ConnectionState::Error);
            return Err(e);
        }
        Ok(())
    }

    /// Close the connection and clear all handlers and rooms.
    pub async fn disconnect(&self) {
        let task = self.dispatch.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(task) = task {
            task.abort();
        }
        self.teardown();
        self.transport.disconnect().await;
        self.state_tx.send_replace(ConnectionState::Disconnected);
    }

    /// Register a handler for a named event.
    pub fn on(&self, event: impl Into<String>, handler: Handler) -> HandlerId {
        let id = HandlerId::new();
        self.handlers
            .entry(event.into())
            .or_default()
            .push((id, handler));
        id
    }

    /// Remove one previously registered handler.
    pub fn off(&self, event: &str, id: HandlerId) {
        if let Some(mut entry) = self.handlers.get_mut(event) {
            entry.retain(|(hid, _)| *hid != id);
        }
    }

    /// Whether a handler registration is still live. Registrations do not
    /// survive a disconnect.
    pub fn is_registered(&self, event: &str, id: HandlerId) -> bool {
        self.handlers
            .get(event)
            .map(|entry| entry.iter().any(|(hid, _)| *hid == id))
            .unwrap_or(false)
    }

    /// Send a named event to the server.
    pub async fn emit(&self, name: &str, payload: Value) -> Result<(), SyncError> {
        self.transport.emit(EventEnvelope::new(name, payload)).await
    }

    /// Ask the server to route a room's events here.
    ///
    /// The join message is sent only once the state is observed
    /// `Connected`: a join requested mid-handshake waits for the
    /// transition rather than being dropped, and at most one join is
    /// sent per live room. Any teardown while waiting cancels the
    /// pending join. Returns whether this call sent the join.
    pub async fn join(&self, room: &str) -> bool {
        match self.rooms.entry(room.to_string()) {
            Entry::Occupied(_) => {
                trace!(room = %room, "join skipped: room already live");
                return false;
            }
            Entry::Vacant(slot) => {
                slot.insert(RoomStatus::Pending);
            }
        }

        let mut state_rx = self.state_tx.subscribe();
        while *state_rx.borrow_and_update() != ConnectionState::Connected {
            trace!(room = %room, "join waiting for connection");
            if state_rx.changed().await.is_err() {
                self.rooms.remove(room);
                return false;
            }
            // Teardown cleared the pending entry; the channel has to
            // re-activate.
            if !self.rooms.contains_key(room) {
                debug!(room = %room, "pending join cancelled by teardown");
                return false;
            }
        }

        if let Err(e) = self.emit(EVENT_JOIN_ROOM, json!({ "room": room })).await {
            warn!(room = %room, error = %e, "join failed");
            self.rooms.remove(room);
            return false;
        }
        if let Some(mut status) = self.rooms.get_mut(room) {
            *status = RoomStatus::Joined;
        }
        debug!(room = %room, "joined room");
        true
    }

    /// Leave a previously joined room. A join still pending is simply
    /// cancelled; the server is only told about joins that were sent.
    pub async fn leave(&self, room: &str) {
        let Some((_, status)) = self.rooms.remove(room) else {
            return;
        };
        if status == RoomStatus::Joined && self.state() == ConnectionState::Connected {
            if let Err(e) = self.emit(EVENT_LEAVE_ROOM, json!({ "room": room })).await {
                warn!(room = %room, error = %e, "leave failed");
            }
        }
        debug!(room = %room, "left room");
    }

    /// Whether a room is live, joined or still pending.
    pub fn is_joined(&self, room: &str) -> bool {
        self.rooms.contains_key(room)
    }

    /// The auth failure that forced the last disconnect, if any.
    pub fn take_error(&self) -> Option<SyncError> {
        self.last_error.lock().unwrap_or_else(|p| p.into_inner()).take()
    }

    fn teardown(&self) {
        self.handlers.clear();
        self.rooms.clear();
    }

    /// Consume transport events: reflect lifecycle transitions and fan
    /// domain events out to registered handlers.
    async fn dispatch(self: Arc<Self>, mut events: broadcast::Receiver<EventEnvelope>) {
        loop {
            match events.recv().await {
                Ok(envelope) if envelope.is_auth_failure() => {
                    warn!(event = %envelope.name, "auth failure from server, disconnecting");
                    *self.last_error.lock().unwrap_or_else(|p| p.into_inner()) =
                        Some(SyncError::Auth(envelope.name.clone()));
                    self.teardown();
                    self.transport.disconnect().await;
                    self.state_tx.send_replace(ConnectionState::Disconnected);
                    return;
                }
                Ok(envelope) if envelope.is_lifecycle() => {
                    match envelope.name.as_str() {
                        EVENT_CONNECT => {
                            info!("connection established");
                            self.state_tx.send_replace(ConnectionState::Connected);
                        }
                        EVENT_DISCONNECT => {
                            info!("connection dropped");
                            self.teardown();
                            self.state_tx.send_replace(ConnectionState::Disconnected);
                        }
                        EVENT_CONNECT_ERROR => {
                            warn!("connection attempt failed");
                            self.teardown();
                            self.state_tx.send_replace(ConnectionState::Error);
                        }
                        _ => {}
                    }
                }
                Ok(envelope) => self.fan_out(&envelope),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("event stream closed");
                    return;
                }
            }
        }
    }

    fn fan_out(&self, envelope: &EventEnvelope) {
        // Snapshot the handler list so a handler may register or remove
        // handlers without deadlocking the registry.
        let handlers: Vec<Handler> = self
            .handlers
            .get(&envelope.name)
            .map(|entry| entry.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();
        trace!(event = %envelope.name, handlers = handlers.len(), "dispatching event");
        for handler in handlers {
            handler(envelope);
        }
    }
}
