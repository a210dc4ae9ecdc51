//! Live price channel: current and previous price for one product.

use std::sync::{Arc, Mutex};

use serde_json::Value;

use agora_core::EventEnvelope;

use crate::manager::{ConnectionManager, HandlerId};

/// Event name: a product's price changed.
pub const EVENT_PRICE_UPDATED: &str = "price_updated";

#[derive(Debug, Default, Clone, Copy)]
pub struct LivePriceState {
    pub current: Option<u64>,
    pub previous: Option<u64>,
}

/// Idempotent: re-applying the current price changes nothing, so a
/// duplicated event never shifts `previous`.
pub fn apply_price(state: &mut LivePriceState, price: u64) {
    if state.current == Some(price) {
        return;
    }
    state.previous = state.current;
    state.current = Some(price);
}

pub struct LivePrice {
    manager: Arc<ConnectionManager>,
    product_id: String,
    state: Arc<Mutex<LivePriceState>>,
    handler: HandlerId,
}

impl LivePrice {
    pub fn room(product_id: &str) -> String {
        format!("product:{product_id}")
    }

    pub async fn activate(manager: Arc<ConnectionManager>, product_id: impl Into<String>) -> Self {
        let product_id = product_id.into();
        let state = Arc::new(Mutex::new(LivePriceState::default()));

        let handler = {
            let state = Arc::clone(&state);
            let product_id = product_id.clone();
            manager.on(
                EVENT_PRICE_UPDATED,
                Arc::new(move |envelope: &EventEnvelope| {
                    if envelope.str_field("product_id") != Some(product_id.as_str()) {
                        return;
                    }
                    let Some(price) = envelope.payload["price"].as_u64() else {
                        return;
                    };
                    let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                    apply_price(&mut state, price);
                }),
            )
        };

        manager.join(&Self::room(&product_id)).await;
        Self {
            manager,
            product_id,
            state,
            handler,
        }
    }

    pub async fn deactivate(self) {
        self.manager.leave(&Self::room(&self.product_id)).await;
        self.manager.off(EVENT_PRICE_UPDATED, self.handler);
    }

    pub fn is_active(&self) -> bool {
        self.manager.is_registered(EVENT_PRICE_UPDATED, self.handler)
    }

    pub fn snapshot(&self) -> LivePriceState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn price_payload(product_id: &str, price: u64) -> Value {
        serde_json::json!({ "product_id": product_id, "price": price })
    }
}
