//! Payload storage behind the cache indexes.
//!
//! The indexes never own payload memory; they hold [`CacheKey`](crate::types::CacheKey)
//! references into a bounded, possibly lossy key-value store. The store is
//! not authoritative: anything it drops can be re-read from upstream.

pub mod lru;

pub use lru::LruPayloadStore;

/// A bounded key-value store for cached payloads.
///
/// Implementations synchronize themselves; the cache calls `get` from many
/// reader threads at once.
pub trait PayloadStore<K, V>: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    ///
    /// Returns the keys dropped to make room. This is the store's eviction
    /// notification: the cache removes the matching index entries before it
    /// releases its write lock.
    fn put(&self, key: K, value: V) -> Vec<K>;

    /// Fetch a copy of the value stored under `key`.
    fn get(&self, key: &K) -> Option<V>;

    /// Remove and return the value stored under `key`.
    fn remove(&self, key: &K) -> Option<V>;

    /// Number of stored values.
    fn len(&self) -> usize;

    /// Whether the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of values kept before eviction.
    fn capacity(&self) -> usize;

    /// Drop every stored value.
    fn clear(&self);
}
