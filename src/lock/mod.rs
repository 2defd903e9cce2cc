//! Locking primitives guarding the cache's shared structures.

pub mod guard;
pub mod upgradable;

pub use guard::{ReadGuard, WriteGuard};
pub use upgradable::UpgradableReadWriteLock;
