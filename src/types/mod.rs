//! All data types for the Trestle cache library.

pub mod error;
pub mod identifier;
pub mod interval;
pub mod record;
pub mod state;

pub use error::{CacheError, CacheResult, LockMode};
pub use identifier::Identifier;
pub use interval::{now_millis, Interval};
pub use record::{CacheKey, CacheRecord, IndexEntry, RemovalCause, RemovalNotice};
pub use state::CacheState;

/// Deepest tree level whose node ids still fit in a `u64`.
pub const MAX_TREE_DEPTH: u32 = 62;

/// Default tree depth for new indexes.
pub const DEFAULT_MAX_DEPTH: u32 = 16;

/// Default domain upper bound: 9999-12-31T23:59:59.999Z in epoch milliseconds.
pub const DEFAULT_DOMAIN_MAX: u64 = 253_402_300_799_999;

/// Default bounded wait for lock acquisition, in milliseconds.
pub const DEFAULT_LOCK_WAIT_TIMEOUT_MS: u64 = 5_000;

/// Default payload store capacity (entries).
pub const DEFAULT_STORE_CAPACITY: usize = 10_000;
