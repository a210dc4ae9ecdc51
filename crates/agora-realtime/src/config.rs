//! Realtime layer configuration.

use std::time::Duration;

/// Default push endpoint.
pub const DEFAULT_REALTIME_URL: &str = "wss://push.agora.vn/socket";

/// Tuning knobs for the realtime layer.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// WebSocket endpoint the transport connects to.
    pub url: String,
    /// How long the cart-sync `is_syncing` flag stays set before it
    /// clears itself.
    pub cart_sync_clear: Duration,
    /// Initial reconnect delay after a dropped connection.
    pub reconnect_initial: Duration,
    /// Upper bound on the reconnect delay.
    pub reconnect_max: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REALTIME_URL.to_string(),
            cart_sync_clear: Duration::from_secs(2),
            reconnect_initial: Duration::from_secs(1),
            reconnect_max: Duration::from_secs(60),
        }
    }
}
