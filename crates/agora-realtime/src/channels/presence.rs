//! Presence channel.
//!
//! Two event names feed the same (status, last_seen) pair: a point-in-time
//! response to an explicit query sent on activation, and an ongoing
//! broadcast. Both are filtered by user id.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use agora_core::EventEnvelope;

use crate::manager::{ConnectionManager, HandlerId};

/// Event name: response to a presence query.
pub const EVENT_PRESENCE_STATE: &str = "presence_state";
/// Event name: ongoing presence broadcast.
pub const EVENT_PRESENCE_UPDATE: &str = "presence_update";
/// Control message: ask for a user's current presence.
pub const EVENT_PRESENCE_QUERY: &str = "presence_query";

#[derive(Debug, Default, Clone)]
pub struct PresenceState {
    pub status: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
}

pub fn apply_presence(state: &mut PresenceState, status: &str, last_seen: Option<&str>) {
    state.status = Some(status.to_string());
    if let Some(raw) = last_seen {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            state.last_seen = Some(ts.with_timezone(&Utc));
        }
    }
}

/// Live presence subscription for one user.
pub struct Presence {
    manager: Arc<ConnectionManager>,
    user_id: String,
    state: Arc<Mutex<PresenceState>>,
    handlers: [HandlerId; 2],
}

impl Presence {
    pub fn room(user_id: &str) -> String {
        format!("presence:{user_id}")
    }

    pub async fn activate(manager: Arc<ConnectionManager>, user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        let state = Arc::new(Mutex::new(PresenceState::default()));

        let make_handler = |state: Arc<Mutex<PresenceState>>, user_id: String| {
            Arc::new(move |envelope: &EventEnvelope| {
                if envelope.str_field("user_id") != Some(user_id.as_str()) {
                    return;
                }
                let Some(status) = envelope.str_field("status") else {
                    return;
                };
                let last_seen = envelope.str_field("last_seen");
                let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                apply_presence(&mut state, status, last_seen);
            })
        };

        let on_state = manager.on(
            EVENT_PRESENCE_STATE,
            make_handler(Arc::clone(&state), user_id.clone()),
        );
        let on_update = manager.on(
            EVENT_PRESENCE_UPDATE,
            make_handler(Arc::clone(&state), user_id.clone()),
        );

        if manager.join(&Self::room(&user_id)).await {
            let _ = manager
                .emit(EVENT_PRESENCE_QUERY, json!({ "user_id": user_id }))
                .await;
        }

        Self {
            manager,
            user_id,
            state,
            handlers: [on_state, on_update],
        }
    }

    pub async fn deactivate(self) {
        self.manager.leave(&Self::room(&self.user_id)).await;
        let [on_state, on_update] = self.handlers;
        self.manager.off(EVENT_PRESENCE_STATE, on_state);
        self.manager.off(EVENT_PRESENCE_UPDATE, on_update);
    }

    pub fn is_active(&self) -> bool {
        self.manager
            .is_registered(EVENT_PRESENCE_UPDATE, self.handlers[1])
    }

    pub fn snapshot(&self) -> PresenceState {
        self.state.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn presence_payload(user_id: &str, status: &str, last_seen: &str) -> Value {
        json!({ "user_id": user_id, "status": status, "last_seen": last_seen })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_event_shapes_update_the_same_pair() {
        let mut state = PresenceState::default();
        apply_presence(&mut state, "online", Some("2026-08-29T10:00:00Z"));
        assert_eq!(state.status.as_deref(), Some("online"));
        assert!(state.last_seen.is_some());

        apply_presence(&mut state, "offline", Some("2026-08-29T10:05:00Z"));
        assert_eq!(state.status.as_deref(), Some("offline"));
    }

    #[test]
    fn test_unparseable_timestamp_keeps_previous_value() {
        let mut state = PresenceState::default();
        apply_presence(&mut state, "online", Some("2026-08-29T10:00:00Z"));
        let before = state.last_seen;
        apply_presence(&mut state, "away", Some("not-a-timestamp"));
        assert_eq!(state.last_seen, before);
        assert_eq!(state.status.as_deref(), Some("away"));
    }
}
