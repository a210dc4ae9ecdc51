//! Cart synchronization channel.
//!
//! Reflects "another session changed your cart" pushes. Each event sets a
//! transient `is_syncing` flag that clears itself after a fixed delay, and
//! invalidates the cart key so the next read re-fetches the authoritative
//! cart.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use agora_cache::{CacheKey, CacheStore, KeyPattern};
use agora_core::EventEnvelope;

use crate::manager::{ConnectionManager, HandlerId};

/// Event name: the cart changed in another session.
pub const EVENT_CART_UPDATED: &str = "cart_updated";

#[derive(Debug, Default)]
struct CartSyncState {
    is_syncing: bool,
    /// Bumped per event so only the latest clear timer wins.
    epoch: u64,
}

/// Live cart-sync subscription for one user.
pub struct CartSync {
    manager: Arc<ConnectionManager>,
    user_id: String,
    state: Arc<Mutex<CartSyncState>>,
    handler: HandlerId,
}

impl CartSync {
    pub fn room(user_id: &str) -> String {
        format!("cart:{user_id}")
    }

    pub async fn activate(
        manager: Arc<ConnectionManager>,
        cache: Arc<CacheStore>,
        user_id: impl Into<String>,
        clear_after: Duration,
    ) -> Self {
        let user_id = user_id.into();
        let state = Arc::new(Mutex::new(CartSyncState::default()));

        let handler = {
            let state = Arc::clone(&state);
            let user_id = user_id.clone();
            manager.on(
                EVENT_CART_UPDATED,
                Arc::new(move |envelope: &EventEnvelope| {
                    if envelope.str_field("user_id") != Some(user_id.as_str()) {
                        return;
                    }
                    debug!(user_id = %user_id, "cart changed in another session");
                    let epoch = {
                        let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                        state.is_syncing = true;
                        state.epoch += 1;
                        state.epoch
                    };
                    cache.invalidate(&KeyPattern::Exact(CacheKey::cart()));

                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        tokio::time::sleep(clear_after).await;
                        let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                        if state.epoch == epoch {
                            state.is_syncing = false;
                        }
                    });
                }),
            )
        };

        manager.join(&Self::room(&user_id)).await;
        Self {
            manager,
            user_id,
            state,
            handler,
        }
    }

    pub async fn deactivate(self) {
        self.manager.leave(&Self::room(&self.user_id)).await;
        self.manager.off(EVENT_CART_UPDATED, self.handler);
    }

    pub fn is_active(&self) -> bool {
        self.manager.is_registered(EVENT_CART_UPDATED, self.handler)
    }

    /// Transient flag: a remote cart change was applied moments ago.
    pub fn is_syncing(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .is_syncing
    }

    pub fn update_payload(user_id: &str, source: &str) -> Value {
        serde_json::json!({ "user_id": user_id, "source": source })
    }
}
