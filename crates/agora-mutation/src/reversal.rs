//! Bounded-lifetime undo tokens for removal mutations.
//!
//! A removal's settle phase is deferred into a [`PendingReversal`]
//! returned to the caller: the UI layer gets explicit `commit`/`revert`
//! entry points instead of a callback captured inside the mutation
//! context. The window is bounded; expiry behaves as `commit`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, warn};

use agora_cache::{CacheSnapshot, CacheStore, KeyPattern};
use agora_core::FeedbackEmitter;

/// How a reversal window was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Settled: authoritative keys invalidated, removal stands.
    Committed,
    /// Undone: pre-removal snapshot restored, then re-synced.
    Reverted,
}

struct ReversalInner {
    cache: Arc<CacheStore>,
    feedback: Arc<dyn FeedbackEmitter>,
    snapshot: CacheSnapshot,
    patterns: Vec<KeyPattern>,
    resolution: Mutex<Option<Resolution>>,
}

impl ReversalInner {
    /// Record a resolution; returns false if one was already recorded.
    fn resolve(&self, resolution: Resolution) -> bool {
        let mut slot = self
            .resolution
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if slot.is_some() {
            return false;
        }
        *slot = Some(resolution);
        true
    }
}

/// Undo token for one confirmed removal.
///
/// Exactly one of `commit`, `revert`, or window expiry takes effect; the
/// others become no-ops. Dropping the token does not resolve it — the
/// expiry timer commits on its own.
#[derive(Clone)]
pub struct PendingReversal {
    inner: Arc<ReversalInner>,
}

impl PendingReversal {
    /// Create a token and start its expiry timer.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn new(
        cache: Arc<CacheStore>,
        feedback: Arc<dyn FeedbackEmitter>,
        snapshot: CacheSnapshot,
        patterns: Vec<KeyPattern>,
        window: Duration,
    ) -> Self {
        let inner = Arc::new(ReversalInner {
            cache,
            feedback,
            snapshot,
            patterns,
            resolution: Mutex::new(None),
        });

        let timer_inner = Arc::clone(&inner);
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if timer_inner.resolve(Resolution::Committed) {
                debug!("reversal window expired, committing removal");
                for pattern in &timer_inner.patterns {
                    timer_inner.cache.invalidate(pattern);
                }
            }
        });

        Self { inner }
    }

    /// Accept the removal: invalidate the authoritative keys so the next
    /// read re-fetches. Idempotent.
    pub fn commit(&self) {
        if !self.inner.resolve(Resolution::Committed) {
            return;
        }
        for pattern in &self.inner.patterns {
            self.inner.cache.invalidate(pattern);
        }
        debug!("removal committed");
    }

    /// Undo the removal: restore the pre-removal snapshot, then
    /// invalidate so the cache re-syncs with the source of truth.
    /// Idempotent; a no-op once committed or expired.
    pub fn revert(&self) {
        if !self.inner.resolve(Resolution::Reverted) {
            warn!("revert after reversal was already resolved, ignoring");
            return;
        }
        self.inner.cache.restore(&self.inner.snapshot);
        for pattern in &self.inner.patterns {
            self.inner.cache.invalidate(pattern);
        }
        self.inner.feedback.info("Đã hoàn tác");
        debug!("removal reverted");
    }

    /// The recorded resolution, if the window has closed.
    pub fn resolution(&self) -> Option<Resolution> {
        *self
            .inner
            .resolution
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
