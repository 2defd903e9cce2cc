//! Lifecycle state of a cache instance.

use serde::Serialize;

/// Lifecycle of a cache: `Uninitialized -> Running -> Draining -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum CacheState {
    /// Constructed but not yet accepting operations.
    Uninitialized = 0,
    /// Accepting reads and writes.
    Running = 1,
    /// Shutting down; in-flight operations finish, new ones are rejected.
    Draining = 2,
    /// Torn down; every operation is rejected.
    Stopped = 3,
}

impl CacheState {
    /// Convert a u8 value to a CacheState, returning None for invalid values.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Uninitialized),
            1 => Some(Self::Running),
            2 => Some(Self::Draining),
            3 => Some(Self::Stopped),
            _ => None,
        }
    }

    /// Return a human-readable name for this state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for CacheState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
