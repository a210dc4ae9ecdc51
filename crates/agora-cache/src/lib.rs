//! Key-addressed snapshot cache for the Agora sync engine.
//!
//! Every entry mirrors a server response envelope for one structured key.
//! Entries are copy-on-write: an update produces a new value rather than
//! mutating in place, which is what makes verbatim rollback possible.
//! The store also tracks a per-key read generation so that a stale
//! in-flight read can be cancelled before an optimistic write.

pub mod key;
pub mod store;

pub use key::{CacheKey, KeyPattern, PurchaseStatus};
pub use store::{CacheEvent, CacheSnapshot, CacheStore, ReadTicket};
