//! Flash sale channel.
//!
//! Tracks the countdown and per-product stock of one flash sale. The
//! tick event carries remaining seconds; a dedicated stock event patches
//! a single product entry without touching the rest of the map.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::trace;

use agora_core::EventEnvelope;

use crate::manager::{ConnectionManager, HandlerId};

/// Event name: countdown tick for a sale.
pub const EVENT_FLASH_SALE_TICK: &str = "flash_sale_tick";
/// Event name: stock change for one product in a sale.
pub const EVENT_FLASH_SALE_STOCK: &str = "flash_sale_stock";

/// Stock counters for one product in the sale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StockEntry {
    pub stock: u64,
    pub sold: u64,
}

#[derive(Debug, Default)]
pub struct FlashSaleState {
    pub remaining_seconds: u64,
    pub ended: bool,
    pub stock: HashMap<String, StockEntry>,
}

/// Apply a countdown tick. Reaching zero flips `ended`, and an ended sale
/// ignores any later tick.
pub fn apply_tick(state: &mut FlashSaleState, remaining_seconds: u64) {
    if state.ended {
        return;
    }
    state.remaining_seconds = remaining_seconds;
    if remaining_seconds == 0 {
        state.ended = true;
    }
}

/// Patch one product's stock entry, leaving every other entry alone.
pub fn apply_stock(state: &mut FlashSaleState, product_id: &str, stock: u64, sold: u64) {
    state
        .stock
        .insert(product_id.to_string(), StockEntry { stock, sold });
}

/// Live subscription to one flash sale.
pub struct FlashSale {
    manager: Arc<ConnectionManager>,
    sale_id: String,
    state: Arc<Mutex<FlashSaleState>>,
    handlers: [HandlerId; 2],
}

impl FlashSale {
    pub fn room(sale_id: &str) -> String {
        format!("flash-sale:{sale_id}")
    }

    pub async fn activate(manager: Arc<ConnectionManager>, sale_id: impl Into<String>) -> Self {
        let sale_id = sale_id.into();
        let state = Arc::new(Mutex::new(FlashSaleState::default()));

        let tick = {
            let state = Arc::clone(&state);
            let sale_id = sale_id.clone();
            manager.on(
                EVENT_FLASH_SALE_TICK,
                Arc::new(move |envelope: &EventEnvelope| {
                    if envelope.str_field("sale_id") != Some(sale_id.as_str()) {
                        trace!(sale_id = %sale_id, "discarding tick for other sale");
                        return;
                    }
                    let Some(seconds) = envelope.payload["remaining_seconds"].as_u64() else {
                        return;
                    };
                    let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                    apply_tick(&mut state, seconds);
                }),
            )
        };
        let stock = {
            let state = Arc::clone(&state);
            let sale_id = sale_id.clone();
            manager.on(
                EVENT_FLASH_SALE_STOCK,
                Arc::new(move |envelope: &EventEnvelope| {
                    if envelope.str_field("sale_id") != Some(sale_id.as_str()) {
                        return;
                    }
                    let Some(product_id) = envelope.str_field("product_id") else {
                        return;
                    };
                    let stock = envelope.payload["stock"].as_u64().unwrap_or(0);
                    let sold = envelope.payload["sold"].as_u64().unwrap_or(0);
                    let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                    apply_stock(&mut state, product_id, stock, sold);
                }),
            )
        };

        manager.join(&Self::room(&sale_id)).await;
        Self {
            manager,
            sale_id,
            state,
            handlers: [tick, stock],
        }
    }

    pub async fn deactivate(self) {
        self.manager.leave(&Self::room(&self.sale_id)).await;
        let [tick, stock] = self.handlers;
        self.manager.off(EVENT_FLASH_SALE_TICK, tick);
        self.manager.off(EVENT_FLASH_SALE_STOCK, stock);
    }

    pub fn is_active(&self) -> bool {
        self.manager
            .is_registered(EVENT_FLASH_SALE_TICK, self.handlers[0])
    }

    pub fn is_ended(&self) -> bool {
        self.state.lock().unwrap_or_else(|p| p.into_inner()).ended
    }

    /// Derived flag: a sale is running until its countdown ends.
    pub fn is_running(&self) -> bool {
        !self.is_ended()
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remaining_seconds
    }

    pub fn stock_for(&self, product_id: &str) -> Option<StockEntry> {
        self.state
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .stock
            .get(product_id)
            .copied()
    }

    pub fn tick_payload(sale_id: &str, remaining_seconds: u64) -> Value {
        serde_json::json!({ "sale_id": sale_id, "remaining_seconds": remaining_seconds })
    }

    pub fn stock_payload(sale_id: &str, product_id: &str, stock: u64, sold: u64) -> Value {
        serde_json::json!({
            "sale_id": sale_id,
            "product_id": product_id,
            "stock": stock,
            "sold": sold,
        })
    }
}
