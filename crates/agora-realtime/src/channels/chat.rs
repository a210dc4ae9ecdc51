//! Buyer/seller chat channel for one conversation.
//!
//! Duplicate message ids are discarded since the transport may deliver a
//! message more than once. Messages from other users bump an unread
//! counter that an explicit mark-read resets.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use agora_core::EventEnvelope;

use crate::manager::{ConnectionManager, HandlerId};

/// Event name: a new message in a conversation.
pub const EVENT_CHAT_MESSAGE: &str = "chat_message";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct ChatState {
    pub messages: Vec<ChatMessage>,
    pub unread: usize,
}

/// Append a message unless its id was already seen. `own_user` marks
/// which sender does not count as unread.
pub fn apply_message(state: &mut ChatState, message: ChatMessage, own_user: &str) {
    if state.messages.iter().any(|m| m.id == message.id) {
        return;
    }
    if message.sender_id != own_user {
        state.unread += 1;
    }
    state.messages.push(message);
}

pub struct Chat {
    manager: Arc<ConnectionManager>,
    conversation_id: String,
    state: Arc<Mutex<ChatState>>,
    handler: HandlerId,
}

impl Chat {
    pub fn room(conversation_id: &str) -> String {
        format!("chat:{conversation_id}")
    }

    pub async fn activate(
        manager: Arc<ConnectionManager>,
        conversation_id: impl Into<String>,
        own_user: impl Into<String>,
    ) -> Self {
        let conversation_id = conversation_id.into();
        let own_user = own_user.into();
        let state = Arc::new(Mutex::new(ChatState::default()));

        let handler = {
            let state = Arc::clone(&state);
            let conversation_id = conversation_id.clone();
            manager.on(
                EVENT_CHAT_MESSAGE,
                Arc::new(move |envelope: &EventEnvelope| {
                    if envelope.str_field("conversation_id") != Some(conversation_id.as_str()) {
                        return;
                    }
                    let Ok(message) =
                        serde_json::from_value::<ChatMessage>(envelope.payload["message"].clone())
                    else {
                        return;
                    };
                    let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                    apply_message(&mut state, message, &own_user);
                }),
            )
        };

        manager.join(&Self::room(&conversation_id)).await;
        Self {
            manager,
            conversation_id,
            state,
            handler,
        }
    }

    pub async fn deactivate(self) {
        self.manager.leave(&Self::room(&self.conversation_id)).await;
        self.manager.off(EVENT_CHAT_MESSAGE, self.handler);
    }

    pub fn is_active(&self) -> bool {
        self.manager.is_registered(EVENT_CHAT_MESSAGE, self.handler)
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .messages
            .clone()
    }

    pub fn unread(&self) -> usize {
        self.state.lock().unwrap_or_else(|p| p.into_inner()).unread
    }

    pub fn mark_read(&self) {
        self.state.lock().unwrap_or_else(|p| p.into_inner()).unread = 0;
    }

    pub fn message_payload(
        conversation_id: &str,
        id: &str,
        sender_id: &str,
        content: &str,
        sent_at: &str,
    ) -> Value {
        serde_json::json!({
            "conversation_id": conversation_id,
            "message": {
                "id": id,
                "sender_id": sender_id,
                "content": content,
                "sent_at": sent_at,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str, sender: &str) -> ChatMessage {
        ChatMessage {
            id: id.into(),
            sender_id: sender.into(),
            content: "xin chào".into(),
            sent_at: "2026-08-29T10:00:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn test_duplicate_message_ids_are_discarded() {
        let mut state = ChatState::default();
        apply_message(&mut state, message("m1", "seller-1"), "buyer-1");
        apply_message(&mut state, message("m1", "seller-1"), "buyer-1");
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.unread, 1);
    }

    #[test]
    fn test_own_messages_do_not_count_as_unread() {
        let mut state = ChatState::default();
        apply_message(&mut state, message("m1", "buyer-1"), "buyer-1");
        apply_message(&mut state, message("m2", "seller-1"), "buyer-1");
        assert_eq!(state.unread, 1);
    }
}
