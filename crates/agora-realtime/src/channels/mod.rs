//! Entity subscription channels.
//!
//! Each channel is a thin adapter over the [`ConnectionManager`]: on
//! activation it joins the entity's room and registers handlers, on
//! deactivation it leaves and deregisters. Every handler filters incoming
//! payloads by entity id and silently discards events for any other
//! entity, and applies events idempotently since delivery is
//! at-least-once.
//!
//! [`ConnectionManager`]: crate::manager::ConnectionManager

pub mod activity;
pub mod cart_sync;
pub mod chat;
pub mod flash_sale;
pub mod inventory_alerts;
pub mod live_price;
pub mod order_tracking;
pub mod presence;
pub mod qa;
pub mod seller;

pub use activity::ActivityFeed;
pub use cart_sync::CartSync;
pub use chat::Chat;
pub use flash_sale::FlashSale;
pub use inventory_alerts::InventoryAlerts;
pub use live_price::LivePrice;
pub use order_tracking::OrderTracking;
pub use presence::Presence;
pub use qa::ProductQa;
pub use seller::SellerDashboard;
