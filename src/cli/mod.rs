//! Command-line front end: interval placement, workload replay and config
//! inspection.

pub mod commands;
pub mod workload;

pub use workload::{load_workload, parse_workload, OpOutcome, WorkloadOp};
