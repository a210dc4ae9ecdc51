//! Order tracking channel.
//!
//! Follows one order through its status transitions. Every applied
//! transition is appended to a history list; re-delivering the current
//! status is a no-op. Terminal states raise a notification once:
//! delivered at success tier, cancelled at warning tier.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::trace;

use agora_core::{EventEnvelope, FeedbackEmitter};

use crate::manager::{ConnectionManager, HandlerId};

/// Event name: the server pushed a new status for an order.
pub const EVENT_ORDER_STATUS: &str = "order_status_updated";

/// Derived local state for one tracked order.
#[derive(Debug, Default)]
pub struct OrderTrackingState {
    /// Current status, unset until the first transition arrives.
    pub current: Option<String>,
    /// Every applied transition, oldest first.
    pub history: Vec<String>,
    /// Set once a terminal-state notification has fired.
    terminal_notified: bool,
}

/// Apply one status event to the state. Returns the notification to
/// raise, if any.
///
/// Idempotent: re-applying the current status changes nothing.
pub fn apply_status(state: &mut OrderTrackingState, status: &str) -> Option<TerminalNotice> {
    if state.current.as_deref() == Some(status) {
        return None;
    }
    state.current = Some(status.to_string());
    state.history.push(status.to_string());

    if state.terminal_notified {
        return None;
    }
    let notice = match status {
        "delivered" => Some(TerminalNotice::Delivered),
        "cancelled" => Some(TerminalNotice::Cancelled),
        _ => None,
    };
    if notice.is_some() {
        state.terminal_notified = true;
    }
    notice
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalNotice {
    Delivered,
    Cancelled,
}

/// Live subscription to one order's status events.
pub struct OrderTracking {
    manager: Arc<ConnectionManager>,
    order_id: String,
    state: Arc<Mutex<OrderTrackingState>>,
    handler: HandlerId,
}

impl OrderTracking {
    /// Room name for one order.
    pub fn room(order_id: &str) -> String {
        format!("order:{order_id}")
    }

    /// Join the order's room and start applying its status events.
    pub async fn activate(
        manager: Arc<ConnectionManager>,
        feedback: Arc<dyn FeedbackEmitter>,
        order_id: impl Into<String>,
    ) -> Self {
        let order_id = order_id.into();
        let state = Arc::new(Mutex::new(OrderTrackingState::default()));

        let handler = {
            let state = Arc::clone(&state);
            let order_id = order_id.clone();
            manager.on(
                EVENT_ORDER_STATUS,
                Arc::new(move |envelope: &EventEnvelope| {
                    if envelope.str_field("order_id") != Some(order_id.as_str()) {
                        trace!(order_id = %order_id, "discarding status for other order");
                        return;
                    }
                    let Some(status) = envelope.str_field("status") else {
                        return;
                    };
                    let notice = {
                        let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                        apply_status(&mut state, status)
                    };
                    match notice {
                        Some(TerminalNotice::Delivered) => {
                            feedback.success("Đơn hàng đã được giao thành công");
                        }
                        Some(TerminalNotice::Cancelled) => {
                            feedback.warning("Đơn hàng đã bị hủy");
                        }
                        None => {}
                    }
                }),
            )
        };

        manager.join(&Self::room(&order_id)).await;
        Self {
            manager,
            order_id,
            state,
            handler,
        }
    }

    /// Leave the room and stop applying events.
    pub async fn deactivate(self) {
        self.manager.leave(&Self::room(&self.order_id)).await;
        self.manager.off(EVENT_ORDER_STATUS, self.handler);
    }

    /// Whether the subscription is still live. Registrations are cleared
    /// on any disconnect, so this flips false after one.
    pub fn is_active(&self) -> bool {
        self.manager.is_registered(EVENT_ORDER_STATUS, self.handler)
    }

    pub fn current_status(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .current
            .clone()
    }

    pub fn history(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .history
            .clone()
    }

    /// Build the status event payload this channel consumes.
    pub fn status_payload(order_id: &str, status: &str) -> Value {
        serde_json::json!({ "order_id": order_id, "status": status })
    }
}
