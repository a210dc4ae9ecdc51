//! Inventory alert channel, active only for administrative sessions.
//!
//! Accumulates low-stock alerts and an unread counter. Critical alerts
//! surface at error tier, warnings at warning tier; an explicit clear
//! resets both the list and the counter.

use std::sync::{Arc, Mutex};

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use agora_core::{EventEnvelope, FeedbackEmitter, ToastTier};

use crate::manager::{ConnectionManager, HandlerId};

/// Event name: a product's stock crossed an alert threshold.
pub const EVENT_INVENTORY_ALERT: &str = "inventory_alert";

/// Room carrying inventory alerts for the whole shop.
pub const INVENTORY_ROOM: &str = "inventory-alerts";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct InventoryAlert {
    pub product_id: String,
    pub product_name: String,
    pub stock: u64,
    pub severity: AlertSeverity,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Critical,
    Warning,
}

impl AlertSeverity {
    pub fn toast_tier(&self) -> ToastTier {
        match self {
            AlertSeverity::Critical => ToastTier::Error,
            AlertSeverity::Warning => ToastTier::Warning,
        }
    }
}

#[derive(Debug, Default)]
pub struct InventoryState {
    pub alerts: Vec<InventoryAlert>,
    pub unread: usize,
}

pub fn apply_alert(state: &mut InventoryState, alert: InventoryAlert) {
    state.alerts.push(alert);
    state.unread += 1;
}

/// Alert subscription. Construction for a non-admin session yields an
/// inert channel that registers nothing.
pub struct InventoryAlerts {
    manager: Arc<ConnectionManager>,
    state: Arc<Mutex<InventoryState>>,
    handler: Option<HandlerId>,
}

impl InventoryAlerts {
    pub async fn activate(
        manager: Arc<ConnectionManager>,
        feedback: Arc<dyn FeedbackEmitter>,
        is_admin: bool,
    ) -> Self {
        let state = Arc::new(Mutex::new(InventoryState::default()));

        if !is_admin {
            debug!("inventory alerts disabled for non-admin session");
            return Self {
                manager,
                state,
                handler: None,
            };
        }

        let handler = {
            let state = Arc::clone(&state);
            manager.on(
                EVENT_INVENTORY_ALERT,
                Arc::new(move |envelope: &EventEnvelope| {
                    let Ok(alert) =
                        serde_json::from_value::<InventoryAlert>(envelope.payload.clone())
                    else {
                        return;
                    };
                    let message = format!(
                        "Sắp hết hàng: {} (còn {})",
                        alert.product_name, alert.stock
                    );
                    feedback.emit(alert.severity.toast_tier(), &message);
                    let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                    apply_alert(&mut state, alert);
                }),
            )
        };

        manager.join(INVENTORY_ROOM).await;
        Self {
            manager,
            state,
            handler: Some(handler),
        }
    }

    pub async fn deactivate(self) {
        if let Some(handler) = self.handler {
            self.manager.leave(INVENTORY_ROOM).await;
            self.manager.off(EVENT_INVENTORY_ALERT, handler);
        }
    }

    pub fn is_active(&self) -> bool {
        self.handler
            .map(|h| self.manager.is_registered(EVENT_INVENTORY_ALERT, h))
            .unwrap_or(false)
    }

    pub fn unread(&self) -> usize {
        self.state.lock().unwrap_or_else(|p| p.into_inner()).unread
    }

    pub fn alerts(&self) -> Vec<InventoryAlert> {
        self.state
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .alerts
            .clone()
    }

    /// Drop every accumulated alert and zero the unread counter.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.alerts.clear();
        state.unread = 0;
    }

    pub fn alert_payload(product_id: &str, product_name: &str, stock: u64, severity: &str) -> Value {
        serde_json::json!({
            "product_id": product_id,
            "product_name": product_name,
            "stock": stock,
            "severity": severity,
        })
    }
}
