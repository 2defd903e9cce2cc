//! Error types for the Trestle cache library.

use thiserror::Error;

use super::state::CacheState;

/// Which side of the upgradable lock an operation was waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Shared (reader) access.
    Read,
    /// Exclusive (writer) access.
    Write,
}

impl std::fmt::Display for LockMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}

/// All errors that can occur in the Trestle cache library.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Interval falls outside the indexed domain.
    #[error("Interval [{low}, {high:?}) outside domain [0, {max}]")]
    Domain {
        low: u64,
        high: Option<u64>,
        max: u64,
    },

    /// Interval has its lower bound above its upper bound.
    #[error("Malformed interval: low {low} > high {high}")]
    MalformedInterval { low: u64, high: u64 },

    /// Query point falls outside the indexed domain.
    #[error("Point {point} outside domain [0, {max}]")]
    PointOutOfDomain { point: u64, max: u64 },

    /// Requested tree depth cannot be represented.
    #[error("Tree depth {depth} exceeds maximum {max}")]
    InvalidDepth { depth: u32, max: u32 },

    /// Lock was not granted within the configured wait window.
    #[error("Timed out after {waited_ms}ms waiting for {mode} lock")]
    LockTimeout { mode: LockMode, waited_ms: u64 },

    /// Unlock called without a matching hold.
    #[error("Illegal lock state: {0}")]
    IllegalLockState(String),

    /// Operation attempted on a cache that is not running.
    #[error("Cache is closed (state: {0})")]
    CacheClosed(CacheState),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A removal listener reported a failure.
    #[error("Listener error: {0}")]
    Listener(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result type for Trestle cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
