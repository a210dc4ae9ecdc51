//! The optimistic mutation controller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use agora_cache::{CacheStore, KeyPattern};
use agora_core::{FeedbackEmitter, SyncError};

use crate::apply;
use crate::context::MutationContext;
use crate::request::MutationRequest;
use crate::reversal::PendingReversal;

/// Network seam: one async request function per mutation kind, supplied
/// by the API-client collaborator. Rejection is failure; any resolution
/// is success.
#[async_trait]
pub trait MutationApi: Send + Sync {
    /// Execute the request against the server, returning the
    /// server-confirmed entity.
    async fn execute(&self, request: &MutationRequest) -> Result<Value, SyncError>;
}

/// Controller tunables.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// How long a removal's undo window stays open before it commits.
    pub undo_window: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            undo_window: Duration::from_secs(5),
        }
    }
}

/// Outcome of a confirmed mutation.
pub struct MutationSuccess {
    /// The server-confirmed entity.
    pub value: Value,
    /// Undo token; present for removal mutations only. Settle for a
    /// removal runs when this token commits, reverts, or expires.
    pub reversal: Option<PendingReversal>,
}

/// Applies every user-initiated write through the four-phase optimistic
/// protocol. See the crate docs for the phase contract.
pub struct OptimisticController {
    cache: Arc<CacheStore>,
    feedback: Arc<dyn FeedbackEmitter>,
    api: Arc<dyn MutationApi>,
    config: ControllerConfig,
}

impl OptimisticController {
    pub fn new(
        cache: Arc<CacheStore>,
        feedback: Arc<dyn FeedbackEmitter>,
        api: Arc<dyn MutationApi>,
    ) -> Self {
        Self::with_config(cache, feedback, api, ControllerConfig::default())
    }

    pub fn with_config(
        cache: Arc<CacheStore>,
        feedback: Arc<dyn FeedbackEmitter>,
        api: Arc<dyn MutationApi>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            cache,
            feedback,
            api,
            config,
        }
    }

    /// Submit a mutation.
    ///
    /// Phases of one instance run strictly in order; phases of different
    /// instances may interleave at the network await. Known race: when
    /// two in-flight mutations touch the same key, the later apply wins
    /// the visible value, but each failure rollback restores its own
    /// snapshot — an earlier mutation's rollback can revert a later
    /// mutation's still-pending change. Serialize submissions per entity
    /// key if that matters to the caller.
    pub async fn submit(&self, request: MutationRequest) -> Result<MutationSuccess, SyncError> {
        let keys = request.touched_keys();

        // Begin: a stale read finishing after our optimistic write must
        // not overwrite it.
        for key in &keys {
            self.cache.cancel_pending(&KeyPattern::Exact(key.clone()));
        }
        let mut ctx = MutationContext::new(self.cache.snapshot(&keys));

        // Apply-locally.
        self.apply_locally(&request, &mut ctx);
        let apply_handle = self.feedback.success(&request.apply_message());
        if request.is_removal() {
            ctx.undo_handle = Some(apply_handle);
        }
        debug!(kind = request.kind(), "mutation applied optimistically");

        // Reconcile.
        match self.api.execute(&request).await {
            Ok(server_value) => {
                self.reconcile_success(&request, &ctx, &server_value);
                let reversal = if request.is_removal() {
                    if let Some(handle) = ctx.undo_handle {
                        self.feedback.dismiss(handle);
                    }
                    self.feedback.success("Xóa thành công");
                    // Settle is deferred into the token.
                    Some(PendingReversal::new(
                        Arc::clone(&self.cache),
                        Arc::clone(&self.feedback),
                        ctx.previous,
                        request.settle_patterns(),
                        self.config.undo_window,
                    ))
                } else {
                    self.settle(&request);
                    None
                };
                debug!(kind = request.kind(), "mutation confirmed");
                Ok(MutationSuccess {
                    value: server_value,
                    reversal,
                })
            }
            Err(err) => {
                // Network and validation rejections roll back alike;
                // only the message differs by kind.
                self.cache.restore(&ctx.previous);
                if let Some(handle) = ctx.undo_handle {
                    self.feedback.dismiss(handle);
                }
                self.feedback.error(&request.failure_message());
                self.settle(&request);
                warn!(kind = request.kind(), error = %err, "mutation rolled back");
                Err(err)
            }
        }
    }

    /// Write the optimistic value for each touched key.
    fn apply_locally(&self, request: &MutationRequest, ctx: &mut MutationContext) {
        match request {
            MutationRequest::AddToCart { product, quantity } => {
                let temp_id = apply::new_temp_id();
                ctx.temp_ids.push(temp_id.clone());
                self.cache.update(agora_cache::CacheKey::cart(), |current| {
                    apply::add_cart_line(current, product, *quantity, &temp_id)
                });
            }
            MutationRequest::UpdateQuantity {
                purchase_id,
                quantity,
            } => {
                self.cache.update(agora_cache::CacheKey::cart(), |current| {
                    apply::patch_quantity(current, purchase_id, *quantity)
                });
            }
            MutationRequest::RemoveFromCart { purchase_ids } => {
                self.cache.update(agora_cache::CacheKey::cart(), |current| {
                    apply::remove_lines(current, purchase_ids)
                });
            }
            MutationRequest::ToggleWishlist { product_id } => {
                self.cache.update(agora_cache::CacheKey::Wishlist, |current| {
                    apply::toggle_wishlist_list(current, product_id)
                });
                self.cache.update(
                    agora_cache::CacheKey::WishlistCheck {
                        product_id: product_id.clone(),
                    },
                    apply::toggle_wishlist_check,
                );
            }
            MutationRequest::LikeReview {
                product_id,
                review_id,
            } => {
                self.cache.update(
                    agora_cache::CacheKey::ProductReviews {
                        product_id: product_id.clone(),
                    },
                    |current| apply::like_review(current, review_id),
                );
            }
            MutationRequest::MarkNotificationRead { notification_id } => {
                self.cache
                    .update(agora_cache::CacheKey::Notifications, |current| {
                        apply::mark_notification_read(current, notification_id)
                    });
                self.cache.update(
                    agora_cache::CacheKey::NotificationCount,
                    apply::decrement_count,
                );
            }
            MutationRequest::MarkAllNotificationsRead => {
                self.cache.update(
                    agora_cache::CacheKey::Notifications,
                    apply::mark_all_notifications_read,
                );
                self.cache
                    .update(agora_cache::CacheKey::NotificationCount, apply::zero_count);
            }
        }
    }

    /// Replace temporary entities with the server-confirmed entity in
    /// every cache key that could contain them.
    fn reconcile_success(&self, request: &MutationRequest, ctx: &MutationContext, server: &Value) {
        if ctx.temp_ids.is_empty() {
            return;
        }
        for key in request.touched_keys() {
            // A key with no cached value holds no temporary entity;
            // writing one here would invent server state.
            let Some(mut value) = self.cache.get(&key) else {
                continue;
            };
            for temp_id in &ctx.temp_ids {
                value = apply::replace_temp_entity(&value, temp_id, server);
            }
            self.cache.set(key, value);
        }
    }

    /// Invalidate the authoritative keys so the next read re-fetches.
    fn settle(&self, request: &MutationRequest) {
        for pattern in request.settle_patterns() {
            self.cache.invalidate(&pattern);
        }
    }
}
