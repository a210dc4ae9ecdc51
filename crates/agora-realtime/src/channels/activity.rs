//! Storefront activity feed: a bounded ring of recent events, newest
//! first. Not entity-scoped; every session sees the same stream.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use agora_core::EventEnvelope;

use crate::manager::{ConnectionManager, HandlerId};

/// Event name: something happened somewhere in the shop.
pub const EVENT_ACTIVITY: &str = "activity";

/// Room carrying the shop-wide activity stream.
pub const ACTIVITY_ROOM: &str = "activity";

/// How many entries the feed retains.
pub const ACTIVITY_CAP: usize = 50;

pub fn apply_activity(feed: &mut VecDeque<Value>, entry: Value, cap: usize) {
    feed.push_front(entry);
    feed.truncate(cap);
}

pub struct ActivityFeed {
    manager: Arc<ConnectionManager>,
    entries: Arc<Mutex<VecDeque<Value>>>,
    handler: HandlerId,
}

impl ActivityFeed {
    pub async fn activate(manager: Arc<ConnectionManager>) -> Self {
        let entries = Arc::new(Mutex::new(VecDeque::new()));

        let handler = {
            let entries = Arc::clone(&entries);
            manager.on(
                EVENT_ACTIVITY,
                Arc::new(move |envelope: &EventEnvelope| {
                    let mut entries = entries.lock().unwrap_or_else(|p| p.into_inner());
                    apply_activity(&mut entries, envelope.payload.clone(), ACTIVITY_CAP);
                }),
            )
        };

        manager.join(ACTIVITY_ROOM).await;
        Self {
            manager,
            entries,
            handler,
        }
    }

    pub async fn deactivate(self) {
        self.manager.leave(ACTIVITY_ROOM).await;
        self.manager.off(EVENT_ACTIVITY, self.handler);
    }

    pub fn is_active(&self) -> bool {
        self.manager.is_registered(EVENT_ACTIVITY, self.handler)
    }

    /// Entries newest first.
    pub fn entries(&self) -> Vec<Value> {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}
