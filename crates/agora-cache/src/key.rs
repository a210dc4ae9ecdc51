//! Structured cache keys.
//!
//! Keys are a tagged variant type (entity kind + qualifiers) instead of
//! loose tuples, and invalidation scopes are an explicit [`KeyPattern`]
//! with a match function per tag instead of a runtime predicate.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a purchase line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    /// Line sits in the cart, not yet ordered.
    InCart,
    /// Ordered, awaiting seller confirmation.
    Pending,
    /// Confirmed by the seller.
    Confirmed,
    /// Handed to the carrier.
    Shipping,
    /// Delivered to the customer.
    Delivered,
    /// Cancelled by either side.
    Cancelled,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::InCart => "in_cart",
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Confirmed => "confirmed",
            PurchaseStatus::Shipping => "shipping",
            PurchaseStatus::Delivered => "delivered",
            PurchaseStatus::Cancelled => "cancelled",
        }
    }
}

/// A structured cache key: entity kind plus qualifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheKey {
    /// Purchase list scoped by status; `InCart` is the cart itself.
    Purchases { status: PurchaseStatus },
    /// The wishlist product list.
    Wishlist,
    /// "Is this product wishlisted" check for one product.
    WishlistCheck { product_id: String },
    /// Notification list.
    Notifications,
    /// Unread notification counter.
    NotificationCount,
    /// One product detail envelope.
    Product { product_id: String },
    /// Review list for one product.
    ProductReviews { product_id: String },
    /// Order list.
    Orders,
    /// One order detail envelope.
    Order { order_id: String },
}

impl CacheKey {
    /// The cart key, shorthand for `Purchases { status: InCart }`.
    pub fn cart() -> Self {
        CacheKey::Purchases {
            status: PurchaseStatus::InCart,
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Purchases { status } => write!(f, "purchases/{}", status.as_str()),
            CacheKey::Wishlist => write!(f, "wishlist"),
            CacheKey::WishlistCheck { product_id } => write!(f, "wishlist/check/{product_id}"),
            CacheKey::Notifications => write!(f, "notifications"),
            CacheKey::NotificationCount => write!(f, "notifications/count"),
            CacheKey::Product { product_id } => write!(f, "product/{product_id}"),
            CacheKey::ProductReviews { product_id } => write!(f, "product/{product_id}/reviews"),
            CacheKey::Orders => write!(f, "orders"),
            CacheKey::Order { order_id } => write!(f, "order/{order_id}"),
        }
    }
}

/// An invalidation/cancellation scope over cache keys.
///
/// Each variant matches a fixed, known set of key tags; there is no
/// reflection over key shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPattern {
    /// Exactly one key.
    Exact(CacheKey),
    /// Every purchase list, whatever the status.
    AllPurchases,
    /// The wishlist and every wishlist check.
    AllWishlist,
    /// The wishlist plus the check for one product.
    WishlistFor { product_id: String },
    /// Notification list and unread counter.
    AllNotifications,
    /// Product detail plus its review list.
    ProductFor { product_id: String },
    /// The order list and every order detail.
    AllOrders,
    /// The order list plus one order detail.
    OrderFor { order_id: String },
}

impl KeyPattern {
    /// Whether `key` falls inside this scope.
    pub fn matches(&self, key: &CacheKey) -> bool {
        match self {
            KeyPattern::Exact(exact) => key == exact,
            KeyPattern::AllPurchases => matches!(key, CacheKey::Purchases { .. }),
            KeyPattern::AllWishlist => {
                matches!(key, CacheKey::Wishlist | CacheKey::WishlistCheck { .. })
            }
            KeyPattern::WishlistFor { product_id } => match key {
                CacheKey::Wishlist => true,
                CacheKey::WishlistCheck { product_id: p } => p == product_id,
                _ => false,
            },
            KeyPattern::AllNotifications => {
                matches!(key, CacheKey::Notifications | CacheKey::NotificationCount)
            }
            KeyPattern::ProductFor { product_id } => match key {
                CacheKey::Product { product_id: p } => p == product_id,
                CacheKey::ProductReviews { product_id: p } => p == product_id,
                _ => false,
            },
            KeyPattern::AllOrders => matches!(key, CacheKey::Orders | CacheKey::Order { .. }),
            KeyPattern::OrderFor { order_id } => match key {
                CacheKey::Orders => true,
                CacheKey::Order { order_id: o } => o == order_id,
                _ => false,
            },
        }
    }
}
