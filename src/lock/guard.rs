//! RAII holds on an [`UpgradableReadWriteLock`].

use std::marker::PhantomData;

use super::upgradable::UpgradableReadWriteLock;
use crate::types::CacheResult;

/// Holds are keyed by thread, so guards must be released on the thread that
/// acquired them.
type NotSend = PhantomData<*const ()>;

/// A read hold, released on drop.
pub struct ReadGuard<'a> {
    lock: &'a UpgradableReadWriteLock,
    _thread_bound: NotSend,
}

impl<'a> ReadGuard<'a> {
    pub(crate) fn new(lock: &'a UpgradableReadWriteLock) -> Self {
        Self {
            lock,
            _thread_bound: PhantomData,
        }
    }

    /// Promote this hold to the write lock without releasing it.
    ///
    /// Succeeds at once when this thread is the sole reader, otherwise waits
    /// until it becomes the sole reader or the wait window elapses. The
    /// returned guard borrows this one, so the write hold is always released
    /// before the read hold.
    pub fn upgrade(&self) -> CacheResult<WriteGuard<'_>> {
        self.lock.write()
    }
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.lock.unlock_read() {
            log::error!("Failed to release read guard: {}", e);
        }
    }
}

/// A write hold, released on drop.
pub struct WriteGuard<'a> {
    lock: &'a UpgradableReadWriteLock,
    _thread_bound: NotSend,
}

impl<'a> WriteGuard<'a> {
    pub(crate) fn new(lock: &'a UpgradableReadWriteLock) -> Self {
        Self {
            lock,
            _thread_bound: PhantomData,
        }
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.lock.unlock_write() {
            log::error!("Failed to release write guard: {}", e);
        }
    }
}
