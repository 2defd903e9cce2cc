//! Cache configuration, loadable from TOML.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{
    CacheError, CacheResult, DEFAULT_DOMAIN_MAX, DEFAULT_LOCK_WAIT_TIMEOUT_MS, DEFAULT_MAX_DEPTH,
    DEFAULT_STORE_CAPACITY, MAX_TREE_DEPTH,
};

/// Construction-time settings for a cache instance.
///
/// `max_depth` and `domain_max` can later be changed on a running cache
/// under its write lock; the others are fixed for the cache's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Finest subdivision level of both interval trees.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    /// Inclusive upper bound of both time axes (epoch milliseconds).
    #[serde(default = "default_domain_max")]
    pub domain_max: u64,
    /// Bounded wait for lock acquisition.
    #[serde(default = "default_lock_wait_timeout_ms")]
    pub lock_wait_timeout_ms: u64,
    /// Maximum number of payloads kept by the default store.
    #[serde(default = "default_store_capacity")]
    pub store_capacity: usize,
}

fn default_max_depth() -> u32 {
    DEFAULT_MAX_DEPTH
}

fn default_domain_max() -> u64 {
    DEFAULT_DOMAIN_MAX
}

fn default_lock_wait_timeout_ms() -> u64 {
    DEFAULT_LOCK_WAIT_TIMEOUT_MS
}

fn default_store_capacity() -> usize {
    DEFAULT_STORE_CAPACITY
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            domain_max: default_domain_max(),
            lock_wait_timeout_ms: default_lock_wait_timeout_ms(),
            store_capacity: default_store_capacity(),
        }
    }
}

impl CacheConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tree depth.
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the domain upper bound.
    pub fn with_domain_max(mut self, domain_max: u64) -> Self {
        self.domain_max = domain_max;
        self
    }

    /// Set the lock wait timeout.
    pub fn with_lock_wait_timeout(mut self, timeout: Duration) -> Self {
        self.lock_wait_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the payload store capacity.
    pub fn with_store_capacity(mut self, capacity: usize) -> Self {
        self.store_capacity = capacity;
        self
    }

    pub fn lock_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_wait_timeout_ms)
    }

    /// Reject values the cache cannot run with.
    pub fn validate(&self) -> CacheResult<()> {
        if self.max_depth > MAX_TREE_DEPTH {
            return Err(CacheError::Config(format!(
                "max_depth {} exceeds {}",
                self.max_depth, MAX_TREE_DEPTH
            )));
        }
        if self.domain_max == u64::MAX {
            return Err(CacheError::Config(
                "domain_max must be below u64::MAX".to_string(),
            ));
        }
        if self.lock_wait_timeout_ms == 0 {
            return Err(CacheError::Config(
                "lock_wait_timeout_ms must be positive".to_string(),
            ));
        }
        if self.store_capacity == 0 {
            return Err(CacheError::Config(
                "store_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> CacheResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| CacheError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> CacheResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CacheError::Io(std::io::Error::other(format!(
                "Failed to read config file {}: {e}",
                path.display()
            )))
        })?;
        Self::from_toml_str(&content)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> CacheResult<String> {
        toml::to_string(self).map_err(|e| CacheError::Config(format!("Failed to render config: {e}")))
    }
}
