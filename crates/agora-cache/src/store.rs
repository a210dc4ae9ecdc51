//! In-memory snapshot store.
//!
//! Holds one immutable JSON snapshot per [`CacheKey`]. Writers replace
//! whole values; readers clone. A broadcast channel fans updates out to
//! interested subscribers (the realtime channels listen for settle-style
//! invalidations this way).
//!
//! Invalidation marks an entry stale instead of dropping it: the stale
//! value keeps rendering until the next read lands a fresh one, and a
//! rollback restore stays observable after settle.
//!
//! Read cancellation: callers that fetch from the network take a
//! [`ReadTicket`] before dispatching and complete it afterwards. A
//! mutation beginning on the same key bumps the key's read generation,
//! so the slow fetch lands on a stale ticket and is discarded instead of
//! overwriting the fresher optimistic value.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::key::{CacheKey, KeyPattern};

/// Broadcast channel capacity for cache updates. High enough to absorb a
/// reconnection burst of invalidations without lagging subscribers.
const BROADCAST_CHANNEL_CAPACITY: usize = 1024;

/// Update event published to cache subscribers.
#[derive(Debug, Clone)]
pub enum CacheEvent {
    /// A key was written (optimistic write, server value, or restore).
    Updated { key: CacheKey },
    /// A key was marked stale; the next read must re-fetch.
    Invalidated { key: CacheKey },
}

/// Ticket for one in-flight read of a key.
///
/// Valid only while the key's read generation is unchanged.
#[derive(Debug, Clone)]
pub struct ReadTicket {
    key: CacheKey,
    generation: u64,
}

/// Verbatim copy of a set of keys' values, captured before a mutation.
///
/// Absent entries are recorded too, so restore can remove keys that did
/// not exist before the mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSnapshot {
    entries: Vec<(CacheKey, Option<Value>)>,
}

impl CacheSnapshot {
    /// Keys captured in this snapshot.
    pub fn keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.entries.iter().map(|(k, _)| k)
    }

    /// The captured value for a key, if the key was captured.
    pub fn value(&self, key: &CacheKey) -> Option<&Option<Value>> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    stale: bool,
}

/// Key-addressed store of server response snapshots.
pub struct CacheStore {
    entries: DashMap<CacheKey, Entry>,
    /// Per-key read generation; bumped by `cancel_pending`.
    read_generations: DashMap<CacheKey, u64>,
    /// Monotonic write counter, for diagnostics.
    writes: AtomicU64,
    updates_tx: broadcast::Sender<CacheEvent>,
}

impl CacheStore {
    /// Create a new empty store.
    pub fn new() -> Arc<Self> {
        let (updates_tx, _) = broadcast::channel(BROADCAST_CHANNEL_CAPACITY);
        Arc::new(Self {
            entries: DashMap::new(),
            read_generations: DashMap::new(),
            writes: AtomicU64::new(0),
            updates_tx,
        })
    }

    /// Subscribe to cache update events.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.updates_tx.subscribe()
    }

    /// Get the current value for a key (stale or fresh).
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        self.entries.get(key).map(|e| e.value().value.clone())
    }

    /// Whether a key currently has a value.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Whether a key's value is stale and due for a re-fetch.
    pub fn is_stale(&self, key: &CacheKey) -> bool {
        self.entries.get(key).map(|e| e.value().stale).unwrap_or(false)
    }

    /// Number of cached keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total writes since creation, for diagnostics.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Replace the value for a key. Clears any stale mark.
    pub fn set(&self, key: CacheKey, value: Value) {
        self.entries.insert(
            key.clone(),
            Entry {
                value,
                stale: false,
            },
        );
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.broadcast(CacheEvent::Updated { key: key.clone() });
        trace!(key = %key, "cache: entry set");
    }

    /// Functional update: compute the new value from the current one.
    ///
    /// The closure receives `None` when the key has no value. The update
    /// is copy-on-write; the previous value is never mutated in place.
    pub fn update(&self, key: CacheKey, f: impl FnOnce(Option<&Value>) -> Value) {
        let next = {
            let current = self.entries.get(&key);
            f(current.as_deref().map(|e| &e.value))
        };
        self.set(key, next);
    }

    /// Remove the value for a key without signaling invalidation.
    ///
    /// Used by snapshot restore; invalidation goes through [`Self::invalidate`].
    fn remove(&self, key: &CacheKey) {
        if self.entries.remove(key).is_some() {
            self.broadcast(CacheEvent::Updated { key: key.clone() });
            trace!(key = %key, "cache: entry removed");
        }
    }

    /// Start a read for a key. Complete it with [`Self::complete_read`].
    pub fn begin_read(&self, key: CacheKey) -> ReadTicket {
        let generation = *self.read_generations.entry(key.clone()).or_insert(0);
        ReadTicket { key, generation }
    }

    /// Land a fetched value, unless the ticket was cancelled meanwhile.
    ///
    /// Returns whether the value was written.
    pub fn complete_read(&self, ticket: ReadTicket, value: Value) -> bool {
        let current = self
            .read_generations
            .get(&ticket.key)
            .map(|g| *g.value())
            .unwrap_or(0);
        if current != ticket.generation {
            debug!(key = %ticket.key, "cache: discarding cancelled read");
            return false;
        }
        self.set(ticket.key, value);
        true
    }

    /// Cancel in-flight reads for every key matching the pattern.
    ///
    /// Outstanding tickets for those keys become stale and their results
    /// are discarded on completion. Writes are unaffected.
    pub fn cancel_pending(&self, pattern: &KeyPattern) {
        // Every ticket ever issued has a generation entry, so bumping the
        // matching entries invalidates all outstanding tickets.
        for mut generation in self.read_generations.iter_mut() {
            if pattern.matches(generation.key()) {
                *generation.value_mut() += 1;
            }
        }
        trace!(?pattern, "cache: pending reads cancelled");
    }

    /// Mark every entry matching the pattern stale so the next read
    /// re-fetches from the source of truth. The stale value remains
    /// readable until then.
    ///
    /// Returns the number of invalidated keys.
    pub fn invalidate(&self, pattern: &KeyPattern) -> usize {
        let mut count = 0;
        let mut invalidated = Vec::new();
        for mut entry in self.entries.iter_mut() {
            if pattern.matches(entry.key()) && !entry.value().stale {
                entry.value_mut().stale = true;
                invalidated.push(entry.key().clone());
                count += 1;
            }
        }
        for key in invalidated {
            self.broadcast(CacheEvent::Invalidated { key: key.clone() });
            trace!(key = %key, "cache: entry invalidated");
        }
        if count > 0 {
            debug!(count, ?pattern, "cache: invalidated");
        }
        count
    }

    /// Capture a verbatim copy of the given keys' current values.
    pub fn snapshot(&self, keys: &[CacheKey]) -> CacheSnapshot {
        let entries = keys
            .iter()
            .map(|key| (key.clone(), self.get(key)))
            .collect();
        CacheSnapshot { entries }
    }

    /// Restore every captured key to its snapshotted value.
    ///
    /// Keys that had no value at capture time are removed again.
    pub fn restore(&self, snapshot: &CacheSnapshot) {
        for (key, value) in &snapshot.entries {
            match value {
                Some(value) => self.set(key.clone(), value.clone()),
                None => self.remove(key),
            }
        }
        debug!(keys = snapshot.entries.len(), "cache: snapshot restored");
    }

    fn broadcast(&self, event: CacheEvent) {
        if self.updates_tx.send(event).is_err() {
            trace!("no subscribers for cache update");
        }
    }
}
