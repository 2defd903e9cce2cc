//! Removal notifications for subsystems holding state derived from cached
//! entries.

use std::sync::{Mutex, PoisonError};

use crate::types::{CacheResult, RemovalNotice};

/// Notified whenever an entry leaves the cache.
///
/// Notifications are delivered after the cache has released its lock, on
/// the thread whose operation caused the removal, so a listener may call
/// back into the cache. Errors are logged and never fail the operation.
pub trait CacheEntryListener: Send + Sync {
    fn on_removed(&self, notice: &RemovalNotice) -> CacheResult<()>;
}

/// A listener that keeps every notice it receives.
#[derive(Debug, Default)]
pub struct CollectingListener {
    notices: Mutex<Vec<RemovalNotice>>,
}

impl CollectingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies of the notices received so far.
    pub fn notices(&self) -> Vec<RemovalNotice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return the notices received so far.
    pub fn take(&self) -> Vec<RemovalNotice> {
        std::mem::take(&mut *self.notices.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheEntryListener for CollectingListener {
    fn on_removed(&self, notice: &RemovalNotice) -> CacheResult<()> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice.clone());
        Ok(())
    }
}
