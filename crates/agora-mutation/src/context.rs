//! Per-mutation rollback context.

use agora_cache::CacheSnapshot;
use agora_core::FeedbackHandle;

/// State owned by exactly one in-flight mutation, created at begin and
/// destroyed at settle.
#[derive(Debug)]
pub struct MutationContext {
    /// Verbatim copy of every touched key, captured before apply.
    pub previous: CacheSnapshot,
    /// Temporary entity ids synthesized during apply-locally.
    pub temp_ids: Vec<String>,
    /// Handle of the undo-capable toast, for removal mutations.
    pub undo_handle: Option<FeedbackHandle>,
}

impl MutationContext {
    pub fn new(previous: CacheSnapshot) -> Self {
        Self {
            previous,
            temp_ids: Vec::new(),
            undo_handle: None,
        }
    }
}
