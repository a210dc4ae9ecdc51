//! Live questions and reviews for one product page.
//!
//! New questions and reviews stream in while the page is open. A new
//! review also invalidates the product's cached review list so the next
//! read re-fetches it with the server-computed aggregates.

use std::sync::{Arc, Mutex};

use serde_json::Value;

use agora_cache::{CacheStore, KeyPattern};
use agora_core::EventEnvelope;

use crate::manager::{ConnectionManager, HandlerId};

/// Event name: someone asked a question on the product page.
pub const EVENT_PRODUCT_QUESTION: &str = "product_question";
/// Event name: a review was posted for the product.
pub const EVENT_REVIEW_ADDED: &str = "review_added";

#[derive(Debug, Default)]
pub struct QaState {
    /// New questions since activation, oldest first.
    pub questions: Vec<Value>,
    /// New reviews since activation, oldest first.
    pub reviews: Vec<Value>,
}

pub struct ProductQa {
    manager: Arc<ConnectionManager>,
    product_id: String,
    state: Arc<Mutex<QaState>>,
    handlers: [HandlerId; 2],
}

impl ProductQa {
    pub fn room(product_id: &str) -> String {
        format!("product:{product_id}")
    }

    pub async fn activate(
        manager: Arc<ConnectionManager>,
        cache: Arc<CacheStore>,
        product_id: impl Into<String>,
    ) -> Self {
        let product_id = product_id.into();
        let state = Arc::new(Mutex::new(QaState::default()));

        let question = {
            let state = Arc::clone(&state);
            let product_id = product_id.clone();
            manager.on(
                EVENT_PRODUCT_QUESTION,
                Arc::new(move |envelope: &EventEnvelope| {
                    if envelope.str_field("product_id") != Some(product_id.as_str()) {
                        return;
                    }
                    let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                    state.questions.push(envelope.payload["question"].clone());
                }),
            )
        };
        let review = {
            let state = Arc::clone(&state);
            let product_id = product_id.clone();
            manager.on(
                EVENT_REVIEW_ADDED,
                Arc::new(move |envelope: &EventEnvelope| {
                    if envelope.str_field("product_id") != Some(product_id.as_str()) {
                        return;
                    }
                    {
                        let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                        state.reviews.push(envelope.payload["review"].clone());
                    }
                    cache.invalidate(&KeyPattern::ProductFor {
                        product_id: product_id.clone(),
                    });
                }),
            )
        };

        manager.join(&Self::room(&product_id)).await;
        Self {
            manager,
            product_id,
            state,
            handlers: [question, review],
        }
    }

    pub async fn deactivate(self) {
        self.manager.leave(&Self::room(&self.product_id)).await;
        let [question, review] = self.handlers;
        self.manager.off(EVENT_PRODUCT_QUESTION, question);
        self.manager.off(EVENT_REVIEW_ADDED, review);
    }

    pub fn is_active(&self) -> bool {
        self.manager
            .is_registered(EVENT_REVIEW_ADDED, self.handlers[1])
    }

    pub fn questions(&self) -> Vec<Value> {
        self.state
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .questions
            .clone()
    }

    pub fn reviews(&self) -> Vec<Value> {
        self.state
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .reviews
            .clone()
    }

    pub fn review_payload(product_id: &str, review: Value) -> Value {
        serde_json::json!({ "product_id": product_id, "review": review })
    }

    pub fn question_payload(product_id: &str, question: Value) -> Value {
        serde_json::json!({ "product_id": product_id, "question": question })
    }
}
