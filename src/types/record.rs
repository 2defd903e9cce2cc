//! Index entries, cache keys and cached records.

use serde::Serialize;

use super::identifier::Identifier;
use super::interval::Interval;

/// A single entry in a temporal index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry<R> {
    /// Which object this entry belongs to.
    pub identifier: Identifier,
    /// The interval the entry covers on its index's time axis.
    pub interval: Interval,
    /// Opaque reference into the payload store.
    pub reference: R,
}

/// Key under which a payload is kept in the payload store.
///
/// Derived from the identifier and the start of both time intervals, which
/// is unique among the live versions of one object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CacheKey {
    pub identifier: Identifier,
    pub valid_start: u64,
    pub transaction_start: u64,
}

impl CacheKey {
    /// Derive the key for a version of `identifier`.
    pub fn derive(identifier: &Identifier, valid: &Interval, transaction: &Interval) -> Self {
        Self {
            identifier: identifier.clone(),
            valid_start: valid.low,
            transaction_start: transaction.low,
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{}:{}",
            self.identifier, self.valid_start, self.transaction_start
        )
    }
}

/// A fully resolved cached object version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheRecord<V> {
    pub identifier: Identifier,
    pub valid: Interval,
    pub transaction: Interval,
    pub payload: V,
}

/// Why an entry left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalCause {
    /// The payload store dropped the payload under capacity pressure.
    Evicted,
    /// Explicit `evict` or `invalidate` call.
    Invalidated,
    /// A newer write covered the same query points.
    Superseded,
    /// Shutdown released the entry.
    Released,
}

impl RemovalCause {
    /// Return a human-readable name for this cause.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Evicted => "evicted",
            Self::Invalidated => "invalidated",
            Self::Superseded => "superseded",
            Self::Released => "released",
        }
    }
}

impl std::fmt::Display for RemovalCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Notification delivered to a [`CacheEntryListener`](crate::cache::CacheEntryListener).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovalNotice {
    pub identifier: Identifier,
    pub valid: Interval,
    pub transaction: Interval,
    pub cause: RemovalCause,
}
