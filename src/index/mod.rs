//! Interval index structures. One independent instance per time axis.

pub mod node;
pub mod temporal_index;

pub use node::NodeId;
pub use temporal_index::TemporalIndex;
