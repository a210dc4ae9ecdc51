//! Realtime layer for the Agora storefront synchronization engine.
//!
//! Three pieces: a [`Transport`] owning the persistent connection and its
//! reconnect policy, a [`ConnectionManager`] reflecting lifecycle state
//! and fanning events out to registered handlers, and the entity
//! subscription [`channels`] that turn pushed events into derived local
//! state.
//!
//! [`Transport`]: transport::Transport
//! [`ConnectionManager`]: manager::ConnectionManager

pub mod channels;
pub mod config;
pub mod manager;
pub mod transport;

pub use config::RealtimeConfig;
pub use manager::{ConnectionManager, ConnectionState, Handler, HandlerId};
pub use transport::{Transport, WsTransport};
