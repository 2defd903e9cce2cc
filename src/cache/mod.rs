//! The bi-temporal cache and the collaborator interfaces it exposes and
//! consumes.

pub mod bitemporal;
mod indexes;
pub mod listener;
pub mod reader;
pub mod stats;

pub use bitemporal::BitemporalCache;
pub use listener::{CacheEntryListener, CollectingListener};
pub use reader::ObjectReader;
pub use stats::CacheStats;
