//! Seller dashboard channel.
//!
//! Aggregates incoming orders and revenue ticks for one seller. Orders
//! are deduplicated by id; revenue ticks carry the absolute running
//! total, so re-delivery is harmless.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use agora_core::EventEnvelope;

use crate::manager::{ConnectionManager, HandlerId};

/// Event name: a new order landed for the seller.
pub const EVENT_SELLER_ORDER: &str = "seller_order";
/// Event name: the seller's running revenue total.
pub const EVENT_SELLER_REVENUE: &str = "seller_revenue_tick";

#[derive(Debug, Default)]
pub struct SellerState {
    seen_orders: HashSet<String>,
    pub order_count: u64,
    pub revenue: u64,
}

/// Count an order once, whatever the delivery count.
pub fn apply_order(state: &mut SellerState, order_id: &str) {
    if state.seen_orders.insert(order_id.to_string()) {
        state.order_count += 1;
    }
}

pub fn apply_revenue(state: &mut SellerState, revenue: u64) {
    state.revenue = revenue;
}

pub struct SellerDashboard {
    manager: Arc<ConnectionManager>,
    seller_id: String,
    state: Arc<Mutex<SellerState>>,
    handlers: [HandlerId; 2],
}

impl SellerDashboard {
    pub fn room(seller_id: &str) -> String {
        format!("seller:{seller_id}")
    }

    pub async fn activate(manager: Arc<ConnectionManager>, seller_id: impl Into<String>) -> Self {
        let seller_id = seller_id.into();
        let state = Arc::new(Mutex::new(SellerState::default()));

        let order = {
            let state = Arc::clone(&state);
            let seller_id = seller_id.clone();
            manager.on(
                EVENT_SELLER_ORDER,
                Arc::new(move |envelope: &EventEnvelope| {
                    if envelope.str_field("seller_id") != Some(seller_id.as_str()) {
                        return;
                    }
                    let Some(order_id) = envelope.str_field("order_id") else {
                        return;
                    };
                    let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                    apply_order(&mut state, order_id);
                }),
            )
        };
        let revenue = {
            let state = Arc::clone(&state);
            let seller_id = seller_id.clone();
            manager.on(
                EVENT_SELLER_REVENUE,
                Arc::new(move |envelope: &EventEnvelope| {
                    if envelope.str_field("seller_id") != Some(seller_id.as_str()) {
                        return;
                    }
                    let Some(total) = envelope.payload["revenue"].as_u64() else {
                        return;
                    };
                    let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                    apply_revenue(&mut state, total);
                }),
            )
        };

        manager.join(&Self::room(&seller_id)).await;
        Self {
            manager,
            seller_id,
            state,
            handlers: [order, revenue],
        }
    }

    pub async fn deactivate(self) {
        self.manager.leave(&Self::room(&self.seller_id)).await;
        let [order, revenue] = self.handlers;
        self.manager.off(EVENT_SELLER_ORDER, order);
        self.manager.off(EVENT_SELLER_REVENUE, revenue);
    }

    pub fn is_active(&self) -> bool {
        self.manager
            .is_registered(EVENT_SELLER_ORDER, self.handlers[0])
    }

    pub fn order_count(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .order_count
    }

    pub fn revenue(&self) -> u64 {
        self.state.lock().unwrap_or_else(|p| p.into_inner()).revenue
    }

    pub fn order_payload(seller_id: &str, order_id: &str) -> Value {
        serde_json::json!({ "seller_id": seller_id, "order_id": order_id })
    }

    pub fn revenue_payload(seller_id: &str, revenue: u64) -> Value {
        serde_json::json!({ "seller_id": seller_id, "revenue": revenue })
    }
}
