//! Reentrant reader/writer lock with in-place read-to-write upgrade.
//!
//! Holds are tracked per thread. A thread that is the only current reader may
//! call [`UpgradableReadWriteLock::lock_write`] without first releasing its
//! read hold, so no other writer can slip in between. Pending write requests
//! block new readers (but not threads that already read) so a stream of
//! readers cannot starve writers.

use std::collections::HashMap;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use super::guard::{ReadGuard, WriteGuard};
use crate::types::{CacheError, CacheResult, LockMode, DEFAULT_LOCK_WAIT_TIMEOUT_MS};

#[derive(Debug, Default)]
struct LockState {
    /// Read hold count per thread.
    readers: HashMap<ThreadId, usize>,
    /// Thread currently holding the write lock.
    writer: Option<ThreadId>,
    /// Reentrant write hold count of `writer`.
    write_holds: usize,
    /// Write requests registered but not yet granted.
    pending_writes: usize,
    /// Threads blocked in either acquire path.
    waiting: usize,
}

impl LockState {
    fn can_read(&self, me: ThreadId) -> bool {
        match self.writer {
            Some(writer) => writer == me,
            None => self.readers.contains_key(&me) || self.pending_writes == 0,
        }
    }

    fn can_write(&self, me: ThreadId) -> bool {
        match self.writer {
            Some(writer) => writer == me,
            None => {
                self.readers.is_empty()
                    || (self.readers.len() == 1 && self.readers.contains_key(&me))
            }
        }
    }
}

/// Multi-reader / single-writer lock keyed by thread identity.
pub struct UpgradableReadWriteLock {
    state: Mutex<LockState>,
    changed: Condvar,
    wait_timeout: Duration,
}

impl UpgradableReadWriteLock {
    /// Create a lock whose acquisitions give up after `wait_timeout`.
    pub fn new(wait_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            changed: Condvar::new(),
            wait_timeout,
        }
    }

    /// The bounded wait applied to every acquisition.
    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    /// Acquire a read hold for the calling thread.
    ///
    /// Granted at once if the thread holds the write lock, or if no writer
    /// holds it and the thread already reads or no writes are pending.
    pub fn lock_read(&self) -> CacheResult<()> {
        let me = thread::current().id();
        let mut state = self.await_grant(LockMode::Read, |s| s.can_read(me), None)?;
        *state.readers.entry(me).or_insert(0) += 1;
        Ok(())
    }

    /// Release one read hold of the calling thread.
    ///
    /// A thread with no read hold gets `IllegalLockState`, logged at error
    /// level, in debug and release builds alike.
    pub fn unlock_read(&self) -> CacheResult<()> {
        let me = thread::current().id();
        let mut state = self.lock_state();
        let Some(count) = state.readers.get_mut(&me) else {
            log::error!("unlock_read called by {:?} without a read hold", me);
            return Err(CacheError::IllegalLockState(format!(
                "thread {me:?} does not hold a read lock"
            )));
        };
        *count -= 1;
        if *count == 0 {
            state.readers.remove(&me);
            self.changed.notify_all();
        }
        Ok(())
    }

    /// Acquire the write lock for the calling thread.
    ///
    /// Granted when the thread already writes, or no other writer holds the
    /// lock and there are either no readers or the caller is the sole reader
    /// (upgrade). An upgraded thread keeps its read hold and must release it
    /// separately after [`unlock_write`](Self::unlock_write).
    pub fn lock_write(&self) -> CacheResult<()> {
        let me = thread::current().id();
        let mut state = self.lock_state();
        state.pending_writes += 1;
        let mut state =
            self.await_grant(LockMode::Write, |s| s.can_write(me), Some(state))?;
        state.pending_writes -= 1;
        state.write_holds += 1;
        state.writer = Some(me);
        Ok(())
    }

    /// Release one write hold of the calling thread.
    ///
    /// A thread that does not own the write lock gets `IllegalLockState`,
    /// logged at error level, in debug and release builds alike.
    pub fn unlock_write(&self) -> CacheResult<()> {
        let me = thread::current().id();
        let mut state = self.lock_state();
        if state.writer != Some(me) {
            log::error!("unlock_write called by {:?} without the write lock", me);
            return Err(CacheError::IllegalLockState(format!(
                "thread {me:?} does not hold the write lock"
            )));
        }
        state.write_holds -= 1;
        if state.write_holds == 0 {
            state.writer = None;
            self.changed.notify_all();
        }
        Ok(())
    }

    /// Acquire a read hold released when the guard drops.
    pub fn read(&self) -> CacheResult<ReadGuard<'_>> {
        self.lock_read()?;
        Ok(ReadGuard::new(self))
    }

    /// Acquire a write hold released when the guard drops.
    pub fn write(&self) -> CacheResult<WriteGuard<'_>> {
        self.lock_write()?;
        Ok(WriteGuard::new(self))
    }

    /// Read holds of the calling thread.
    pub fn read_count(&self) -> usize {
        let me = thread::current().id();
        self.lock_state().readers.get(&me).copied().unwrap_or(0)
    }

    /// Number of distinct threads holding a read lock.
    pub fn reader_threads(&self) -> usize {
        self.lock_state().readers.len()
    }

    pub fn is_write_locked(&self) -> bool {
        self.lock_state().writer.is_some()
    }

    pub fn is_write_locked_by_current(&self) -> bool {
        self.lock_state().writer == Some(thread::current().id())
    }

    /// Write requests not yet granted.
    pub fn pending_writes(&self) -> usize {
        self.lock_state().pending_writes
    }

    /// Threads currently blocked waiting for either mode.
    pub fn queue_depth(&self) -> usize {
        self.lock_state().waiting
    }

    fn lock_state(&self) -> MutexGuard<'_, LockState> {
        // The state is only mutated by short non-panicking sections.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until `grantable` holds or the wait window elapses. A failed
    /// write request withdraws its pending registration.
    fn await_grant<'a>(
        &'a self,
        mode: LockMode,
        grantable: impl Fn(&LockState) -> bool,
        held: Option<MutexGuard<'a, LockState>>,
    ) -> CacheResult<MutexGuard<'a, LockState>> {
        let mut state = held.unwrap_or_else(|| self.lock_state());
        if grantable(&state) {
            return Ok(state);
        }

        let started = Instant::now();
        state.waiting += 1;
        let (mut state, _) = self
            .changed
            .wait_timeout_while(state, self.wait_timeout, |s| !grantable(&*s))
            .unwrap_or_else(PoisonError::into_inner);
        state.waiting -= 1;

        if grantable(&state) {
            return Ok(state);
        }

        if mode == LockMode::Write {
            state.pending_writes -= 1;
            // Readers held back by this request may proceed now.
            self.changed.notify_all();
        }
        let waited_ms = started.elapsed().as_millis() as u64;
        log::warn!(
            "{} lock not granted to {:?} after {}ms",
            mode,
            thread::current().id(),
            waited_ms
        );
        Err(CacheError::LockTimeout { mode, waited_ms })
    }
}

impl Default for UpgradableReadWriteLock {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_LOCK_WAIT_TIMEOUT_MS))
    }
}

impl std::fmt::Debug for UpgradableReadWriteLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock_state();
        f.debug_struct("UpgradableReadWriteLock")
            .field("readers", &state.readers.len())
            .field("writer", &state.writer)
            .field("write_holds", &state.write_holds)
            .field("pending_writes", &state.pending_writes)
            .field("wait_timeout", &self.wait_timeout)
            .finish()
    }
}
