//! Trestle cache: a bi-temporal object cache for a spatio-temporal knowledge base.
//!
//! Answers "what was object X as of valid time V, as recorded at transaction
//! time T" from two bounded-depth interval trees (one per time axis) and a
//! bounded payload store, guarded by a reader/writer lock that lets a sole
//! reader upgrade to writer in place.

pub mod cache;
pub mod cli;
pub mod config;
pub mod index;
pub mod lock;
pub mod store;
pub mod types;

// Re-export commonly used types at the crate root
pub use cache::{BitemporalCache, CacheEntryListener, CacheStats, CollectingListener, ObjectReader};
pub use config::CacheConfig;
pub use index::{NodeId, TemporalIndex};
pub use lock::{ReadGuard, UpgradableReadWriteLock, WriteGuard};
pub use store::{LruPayloadStore, PayloadStore};
pub use types::{
    now_millis, CacheError, CacheKey, CacheRecord, CacheResult, CacheState, Identifier,
    IndexEntry, Interval, LockMode, RemovalCause, RemovalNotice, MAX_TREE_DEPTH,
};
