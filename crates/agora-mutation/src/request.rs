//! User-initiated write requests.
//!
//! A request is immutable once submitted. Each kind knows which cache
//! keys it touches optimistically, which patterns it settles, and the
//! user-facing messages for its apply and failure toasts.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use agora_cache::{CacheKey, KeyPattern};

/// A user-initiated mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutationRequest {
    /// Add a product to the cart. `product` is the product envelope as
    /// served by the catalog (must carry an `id` field).
    AddToCart { product: Value, quantity: u32 },
    /// Change the quantity of an existing cart line.
    UpdateQuantity { purchase_id: String, quantity: u32 },
    /// Remove one or more cart lines.
    RemoveFromCart { purchase_ids: Vec<String> },
    /// Add or remove a product from the wishlist.
    ToggleWishlist { product_id: String },
    /// Like (or unlike) a product review.
    LikeReview { product_id: String, review_id: String },
    /// Mark one notification as read.
    MarkNotificationRead { notification_id: String },
    /// Mark every notification as read.
    MarkAllNotificationsRead,
}

impl MutationRequest {
    /// Stable name of the mutation kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            MutationRequest::AddToCart { .. } => "add_to_cart",
            MutationRequest::UpdateQuantity { .. } => "update_quantity",
            MutationRequest::RemoveFromCart { .. } => "remove_from_cart",
            MutationRequest::ToggleWishlist { .. } => "toggle_wishlist",
            MutationRequest::LikeReview { .. } => "like_review",
            MutationRequest::MarkNotificationRead { .. } => "mark_notification_read",
            MutationRequest::MarkAllNotificationsRead => "mark_all_notifications_read",
        }
    }

    /// The cache keys this mutation writes optimistically.
    pub fn touched_keys(&self) -> Vec<CacheKey> {
        match self {
            MutationRequest::AddToCart { .. }
            | MutationRequest::UpdateQuantity { .. }
            | MutationRequest::RemoveFromCart { .. } => vec![CacheKey::cart()],
            MutationRequest::ToggleWishlist { product_id } => vec![
                CacheKey::Wishlist,
                CacheKey::WishlistCheck {
                    product_id: product_id.clone(),
                },
            ],
            MutationRequest::LikeReview { product_id, .. } => vec![CacheKey::ProductReviews {
                product_id: product_id.clone(),
            }],
            MutationRequest::MarkNotificationRead { .. }
            | MutationRequest::MarkAllNotificationsRead => {
                vec![CacheKey::Notifications, CacheKey::NotificationCount]
            }
        }
    }

    /// The authoritative key patterns invalidated at settle.
    pub fn settle_patterns(&self) -> Vec<KeyPattern> {
        match self {
            MutationRequest::AddToCart { .. }
            | MutationRequest::UpdateQuantity { .. }
            | MutationRequest::RemoveFromCart { .. } => vec![KeyPattern::AllPurchases],
            MutationRequest::ToggleWishlist { product_id } => vec![KeyPattern::WishlistFor {
                product_id: product_id.clone(),
            }],
            MutationRequest::LikeReview { product_id, .. } => vec![KeyPattern::ProductFor {
                product_id: product_id.clone(),
            }],
            MutationRequest::MarkNotificationRead { .. }
            | MutationRequest::MarkAllNotificationsRead => vec![KeyPattern::AllNotifications],
        }
    }

    /// Whether this mutation creates a new entity (needs a temporary id).
    pub fn is_creation(&self) -> bool {
        matches!(self, MutationRequest::AddToCart { .. })
    }

    /// Whether this mutation removes entities and offers an undo window.
    pub fn is_removal(&self) -> bool {
        matches!(self, MutationRequest::RemoveFromCart { .. })
    }

    /// Success-style message emitted at apply-locally.
    ///
    /// For removals this is the undo-capable toast, carrying the count.
    pub fn apply_message(&self) -> String {
        match self {
            MutationRequest::AddToCart { .. } => "Đã thêm vào giỏ hàng".to_string(),
            MutationRequest::UpdateQuantity { .. } => "Đã cập nhật số lượng".to_string(),
            MutationRequest::RemoveFromCart { purchase_ids } => {
                format!("Đã xóa {} sản phẩm", purchase_ids.len())
            }
            MutationRequest::ToggleWishlist { .. } => {
                "Đã cập nhật danh sách yêu thích".to_string()
            }
            MutationRequest::LikeReview { .. } => "Đã thích đánh giá".to_string(),
            MutationRequest::MarkNotificationRead { .. } => "Đã đánh dấu đã đọc".to_string(),
            MutationRequest::MarkAllNotificationsRead => {
                "Đã đánh dấu tất cả đã đọc".to_string()
            }
        }
    }

    /// Failure message naming the attempted operation.
    pub fn failure_message(&self) -> String {
        match self {
            MutationRequest::AddToCart { .. } => "Không thể thêm vào giỏ hàng".to_string(),
            MutationRequest::UpdateQuantity { .. } => "Không thể cập nhật số lượng".to_string(),
            MutationRequest::RemoveFromCart { .. } => "Không thể xóa sản phẩm".to_string(),
            MutationRequest::ToggleWishlist { .. } => {
                "Không thể cập nhật danh sách yêu thích".to_string()
            }
            MutationRequest::LikeReview { .. } => "Không thể thích đánh giá".to_string(),
            MutationRequest::MarkNotificationRead { .. }
            | MutationRequest::MarkAllNotificationsRead => {
                "Không thể đánh dấu đã đọc".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cart_mutations_touch_the_cart_key() {
        let requests = [
            MutationRequest::AddToCart {
                product: json!({"id": "P1"}),
                quantity: 2,
            },
            MutationRequest::UpdateQuantity {
                purchase_id: "A".into(),
                quantity: 5,
            },
            MutationRequest::RemoveFromCart {
                purchase_ids: vec!["A".into()],
            },
        ];
        for request in requests {
            assert_eq!(request.touched_keys(), vec![CacheKey::cart()]);
            assert_eq!(request.settle_patterns(), vec![KeyPattern::AllPurchases]);
        }
    }

    #[test]
    fn test_wishlist_touches_list_and_check() {
        let request = MutationRequest::ToggleWishlist {
            product_id: "P1".into(),
        };
        assert_eq!(
            request.touched_keys(),
            vec![
                CacheKey::Wishlist,
                CacheKey::WishlistCheck {
                    product_id: "P1".into()
                }
            ]
        );
    }

    #[test]
    fn test_removal_apply_message_carries_count() {
        let request = MutationRequest::RemoveFromCart {
            purchase_ids: vec!["A".into(), "B".into()],
        };
        assert!(request.is_removal());
        assert_eq!(request.apply_message(), "Đã xóa 2 sản phẩm");
    }

    #[test]
    fn test_only_add_to_cart_is_creation() {
        assert!(
            MutationRequest::AddToCart {
                product: json!({"id": "P1"}),
                quantity: 1
            }
            .is_creation()
        );
        assert!(!MutationRequest::MarkAllNotificationsRead.is_creation());
    }
}
