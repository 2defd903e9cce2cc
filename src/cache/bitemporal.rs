//! Bi-temporal object cache. Answers "object X as of valid time V, as
//! recorded at transaction time T" from two interval indexes and a bounded
//! payload store.
//!
//! Index mutation happens only under the write hold of the cache's
//! [`UpgradableReadWriteLock`]; reads share it. Removal notifications are
//! queued while the lock is held and delivered once it has been released.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::indexes::{CacheIndexes, RecordMeta};
use super::listener::CacheEntryListener;
use super::reader::ObjectReader;
use super::stats::{CacheStats, Counters};
use crate::config::CacheConfig;
use crate::lock::UpgradableReadWriteLock;
use crate::store::{LruPayloadStore, PayloadStore};
use crate::types::{
    CacheError, CacheKey, CacheRecord, CacheResult, CacheState, Identifier, Interval,
    RemovalCause, RemovalNotice,
};

/// Outcome of searching the indexes and the store under a read hold.
enum Lookup<V> {
    Hit(CacheRecord<V>),
    Miss,
    /// The indexes named a version whose payload the store no longer has.
    Stale(CacheKey),
}

/// The bi-temporal cache. Generic over the payload type.
pub struct BitemporalCache<V> {
    lock: UpgradableReadWriteLock,
    /// Entered only while the matching hold on `lock` is held, so it is never
    /// contended; it provides the interior mutability.
    indexes: RwLock<CacheIndexes>,
    store: Box<dyn PayloadStore<CacheKey, V>>,
    listeners: RwLock<Vec<Arc<dyn CacheEntryListener>>>,
    pending: Mutex<Vec<RemovalNotice>>,
    state: AtomicU8,
    counters: Counters,
}

impl<V> BitemporalCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a running cache backed by an LRU store of
    /// `config.store_capacity` payloads.
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        let store = LruPayloadStore::new(config.store_capacity);
        Self::with_store(config, Box::new(store))
    }
}

impl<V: Clone> BitemporalCache<V> {
    /// Create a running cache over a caller-supplied payload store.
    pub fn with_store(
        config: CacheConfig,
        store: Box<dyn PayloadStore<CacheKey, V>>,
    ) -> CacheResult<Self> {
        config.validate()?;
        let cache = Self {
            lock: UpgradableReadWriteLock::new(config.lock_wait_timeout()),
            indexes: RwLock::new(CacheIndexes::new(config.max_depth, config.domain_max)?),
            store,
            listeners: RwLock::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            state: AtomicU8::new(CacheState::Uninitialized as u8),
            counters: Counters::default(),
        };
        cache.transition(CacheState::Running);
        log::info!(
            "Cache started: max_depth={}, domain_max={}, capacity={}",
            config.max_depth,
            config.domain_max,
            cache.store.capacity()
        );
        Ok(cache)
    }

    /// Register a listener for removal notifications.
    pub fn add_listener(&self, listener: Arc<dyn CacheEntryListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// The lock guarding the indexes. Holding a read hold across several
    /// cache calls lets a later `write` upgrade in place.
    pub fn lock(&self) -> &UpgradableReadWriteLock {
        &self.lock
    }

    pub fn state(&self) -> CacheState {
        CacheState::from_u8(self.state.load(Ordering::Acquire)).unwrap_or(CacheState::Stopped)
    }

    /// Cache a version of `identifier`.
    ///
    /// Versions of the same identifier whose intervals cover the new ones on
    /// both time axes are superseded first. Partial overlaps are kept and
    /// resolved at read time.
    pub fn write(
        &self,
        identifier: Identifier,
        valid: Interval,
        transaction: Interval,
        payload: V,
    ) -> CacheResult<()> {
        self.ensure_running()?;
        let notices = {
            let _guard = self.lock.write()?;
            self.ensure_running()?;
            let mut indexes = self.indexes_mut();
            self.write_locked(&mut indexes, &identifier, valid, transaction, payload)?
        };
        self.publish(notices);
        Ok(())
    }

    /// The payload of `identifier` as of `(valid_time, transaction_time)`.
    pub fn read(
        &self,
        identifier: &Identifier,
        valid_time: u64,
        transaction_time: u64,
    ) -> CacheResult<Option<V>> {
        Ok(self
            .read_record(identifier, valid_time, transaction_time)?
            .map(|r| r.payload))
    }

    /// Like [`read`](Self::read), returning the matching version's intervals
    /// along with its payload.
    pub fn read_record(
        &self,
        identifier: &Identifier,
        valid_time: u64,
        transaction_time: u64,
    ) -> CacheResult<Option<CacheRecord<V>>> {
        self.ensure_running()?;
        let found = {
            let _guard = self.lock.read()?;
            self.ensure_running()?;
            self.look_up(identifier, valid_time, transaction_time)?
        };

        match found {
            Lookup::Hit(record) => {
                Counters::add(&self.counters.hits, 1);
                Ok(Some(record))
            }
            Lookup::Miss => {
                Counters::add(&self.counters.misses, 1);
                Ok(None)
            }
            Lookup::Stale(key) => {
                Counters::add(&self.counters.misses, 1);
                log::debug!("Payload for {} lost by store; purging index entries", key);
                if let Err(e) = self.handle_store_eviction(&key) {
                    log::warn!("Failed to purge stale entry {}: {}", key, e);
                }
                Ok(None)
            }
        }
    }

    /// Read, falling back to `reader` on a miss and caching what it returns.
    ///
    /// The read hold is upgraded in place for the fallback, so no other
    /// writer can run between the miss and the fill.
    pub fn read_through(
        &self,
        identifier: &Identifier,
        valid_time: u64,
        transaction_time: u64,
        reader: &dyn ObjectReader<V>,
    ) -> CacheResult<Option<V>> {
        self.ensure_running()?;
        let read_guard = self.lock.read()?;
        self.ensure_running()?;
        let stale = match self.look_up(identifier, valid_time, transaction_time)? {
            Lookup::Hit(record) => {
                Counters::add(&self.counters.hits, 1);
                return Ok(Some(record.payload));
            }
            Lookup::Miss => None,
            Lookup::Stale(key) => Some(key),
        };
        Counters::add(&self.counters.misses, 1);

        let (outcome, notices) = {
            let _write_guard = read_guard.upgrade()?;
            self.ensure_running()?;
            // No index guard is held while the reader runs, so it may call
            // back into this cache.
            let fetched = reader.read_object(identifier, valid_time, transaction_time);
            let mut indexes = self.indexes_mut();
            let mut notices = Vec::new();
            if let Some(key) = stale {
                notices.extend(self.remove_locked(&mut indexes, &key, RemovalCause::Evicted));
            }
            let outcome = match fetched {
                Ok(Some(record)) => self.fill_locked(
                    &mut indexes,
                    identifier,
                    valid_time,
                    transaction_time,
                    record,
                    &mut notices,
                ),
                other => other.map(|_| None),
            };
            (outcome, notices)
        };
        drop(read_guard);
        self.publish(notices);
        outcome
    }

    /// Remove the versions of `identifier` with exactly this valid interval.
    /// Returns how many were removed; evicting twice is a no-op.
    pub fn evict(&self, identifier: &Identifier, valid: &Interval) -> CacheResult<usize> {
        self.remove_matching(identifier, |meta| meta.valid == *valid)
    }

    /// Remove every version of `identifier`.
    pub fn invalidate(&self, identifier: &Identifier) -> CacheResult<usize> {
        self.remove_matching(identifier, |_| true)
    }

    /// Drop the entries for a payload the store evicted on its own.
    ///
    /// Stores that evict asynchronously call this; it takes the write lock
    /// before touching the indexes. Nothing is removed if the store holds
    /// the payload again by then.
    pub fn handle_store_eviction(&self, key: &CacheKey) -> CacheResult<bool> {
        self.ensure_running()?;
        let notice = {
            let _guard = self.lock.write()?;
            self.ensure_running()?;
            if self.store.get(key).is_some() {
                log::debug!("Payload for {} is stored again; keeping entry", key);
                return Ok(false);
            }
            let mut indexes = self.indexes_mut();
            self.remove_locked(&mut indexes, key, RemovalCause::Evicted)
        };
        let removed = notice.is_some();
        self.publish(notice.into_iter().collect());
        Ok(removed)
    }

    /// Change the depth of both indexes.
    pub fn set_max_depth(&self, max_depth: u32) -> CacheResult<()> {
        self.ensure_running()?;
        let _guard = self.lock.write()?;
        self.ensure_running()?;
        let mut indexes = self.indexes_mut();
        indexes.valid_index.set_max_depth(max_depth)?;
        indexes.transaction_index.set_max_depth(max_depth)?;
        log::info!("Index depth set to {}", max_depth);
        Ok(())
    }

    /// Change the domain of both indexes. Fails without changing either if
    /// a cached interval falls outside the new domain.
    pub fn set_domain_max(&self, domain_max: u64) -> CacheResult<()> {
        self.ensure_running()?;
        let _guard = self.lock.write()?;
        self.ensure_running()?;
        let mut indexes = self.indexes_mut();
        indexes.valid_index.check_domain_change(domain_max)?;
        indexes.transaction_index.check_domain_change(domain_max)?;
        indexes.valid_index.set_domain_max(domain_max)?;
        indexes.transaction_index.set_domain_max(domain_max)?;
        log::info!("Index domain set to [0, {}]", domain_max);
        Ok(())
    }

    /// Stop accepting operations and release every cached entry.
    ///
    /// New operations fail with `CacheClosed(Draining)` at once, while the
    /// ones already holding the lock finish. With `drain` listeners are told
    /// about every released entry (cause `Released`) after any notices still
    /// queued; without it they hear nothing. If the write lock cannot be taken
    /// within the lock timeout the cache goes back to `Running` and the error
    /// is returned. Calling it on a stopped cache does nothing.
    pub fn shutdown(&self, drain: bool) -> CacheResult<()> {
        if self.state() == CacheState::Stopped {
            return Ok(());
        }
        self.transition(CacheState::Draining);
        let released = {
            let _guard = match self.lock.write() {
                Ok(guard) => guard,
                Err(e) => {
                    self.abandon_drain();
                    log::warn!("Shutdown abandoned; cache keeps running: {}", e);
                    return Err(e);
                }
            };
            let mut indexes = self.indexes_mut();
            let released = indexes.drain_records();
            self.store.clear();
            self.refresh_gauges(&indexes);
            self.transition(CacheState::Stopped);
            log::info!("Cache stopped; released {} entries", released.len());
            released
        };

        let mut pending = std::mem::take(&mut *self.pending_queue());
        if drain {
            pending.extend(released.into_iter().map(|(key, meta)| RemovalNotice {
                identifier: key.identifier,
                valid: meta.valid,
                transaction: meta.transaction,
                cause: RemovalCause::Released,
            }));
            self.deliver(pending);
        } else if !pending.is_empty() {
            log::warn!("Discarding {} undelivered removal notices", pending.len());
        }
        Ok(())
    }

    /// Snapshot of counters and gauges. Never blocks on the cache lock.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            stored_payloads: self.store.len(),
            lock_queue_depth: self.lock.queue_depth(),
            ..self.counters.snapshot()
        }
    }

    /// Search both indexes, then the store. Requires a read hold.
    fn look_up(
        &self,
        identifier: &Identifier,
        valid_time: u64,
        transaction_time: u64,
    ) -> CacheResult<Lookup<V>> {
        let found = self
            .indexes_ref()
            .lookup(identifier, valid_time, transaction_time)?;
        let Some((key, meta)) = found else {
            return Ok(Lookup::Miss);
        };
        Ok(match self.store.get(&key) {
            Some(payload) => Lookup::Hit(CacheRecord {
                identifier: identifier.clone(),
                valid: meta.valid,
                transaction: meta.transaction,
                payload,
            }),
            None => Lookup::Stale(key),
        })
    }

    /// Supersede, insert and store. Requires the write hold.
    fn write_locked(
        &self,
        indexes: &mut CacheIndexes,
        identifier: &Identifier,
        valid: Interval,
        transaction: Interval,
        payload: V,
    ) -> CacheResult<Vec<RemovalNotice>> {
        indexes.check_intervals(&valid, &transaction)?;

        let key = CacheKey::derive(identifier, &valid, &transaction);
        let mut notices = Vec::new();
        for old in indexes.conflicting(identifier, &valid, &transaction, &key) {
            notices.extend(self.remove_locked(indexes, &old, RemovalCause::Superseded));
        }

        let key = indexes.insert_record(identifier, valid, transaction)?;
        for evicted in self.store.put(key, payload) {
            notices.extend(self.remove_locked(indexes, &evicted, RemovalCause::Evicted));
        }

        Counters::add(&self.counters.writes, 1);
        self.refresh_gauges(indexes);
        log::debug!(
            "Cached {} valid {} tx {} ({} removals)",
            identifier,
            valid,
            transaction,
            notices.len()
        );
        Ok(notices)
    }

    /// Cache what the object reader returned. The payload is handed back
    /// only if the record actually covers the query point. Requires the
    /// write hold.
    fn fill_locked(
        &self,
        indexes: &mut CacheIndexes,
        identifier: &Identifier,
        valid_time: u64,
        transaction_time: u64,
        record: CacheRecord<V>,
        notices: &mut Vec<RemovalNotice>,
    ) -> CacheResult<Option<V>> {
        let covers = record.identifier == *identifier
            && record.valid.contains(valid_time)
            && record.transaction.contains(transaction_time);
        if !covers {
            log::warn!(
                "Object reader returned {} valid {} tx {} for query {} @ ({}, {})",
                record.identifier,
                record.valid,
                record.transaction,
                identifier,
                valid_time,
                transaction_time
            );
        }
        let payload = covers.then(|| record.payload.clone());
        notices.extend(self.write_locked(
            indexes,
            &record.identifier,
            record.valid,
            record.transaction,
            record.payload,
        )?);
        Ok(payload)
    }

    /// Remove one version from indexes and store. Requires the write hold.
    fn remove_locked(
        &self,
        indexes: &mut CacheIndexes,
        key: &CacheKey,
        cause: RemovalCause,
    ) -> Option<RemovalNotice> {
        let meta = indexes.remove_record(key)?;
        if cause != RemovalCause::Evicted {
            self.store.remove(key);
        }
        let counter = match cause {
            RemovalCause::Evicted => &self.counters.evictions,
            RemovalCause::Invalidated | RemovalCause::Released => &self.counters.invalidations,
            RemovalCause::Superseded => &self.counters.superseded,
        };
        Counters::add(counter, 1);
        self.refresh_gauges(indexes);
        Some(RemovalNotice {
            identifier: key.identifier.clone(),
            valid: meta.valid,
            transaction: meta.transaction,
            cause,
        })
    }

    fn remove_matching(
        &self,
        identifier: &Identifier,
        matches: impl Fn(&RecordMeta) -> bool,
    ) -> CacheResult<usize> {
        self.ensure_running()?;
        let notices = {
            let _guard = self.lock.write()?;
            self.ensure_running()?;
            let mut indexes = self.indexes_mut();
            let keys: Vec<CacheKey> = indexes
                .keys_for(identifier)
                .into_iter()
                .filter(|k| indexes.meta(k).is_some_and(&matches))
                .collect();
            let mut notices = Vec::with_capacity(keys.len());
            for key in keys {
                notices.extend(self.remove_locked(&mut indexes, &key, RemovalCause::Invalidated));
            }
            notices
        };
        let removed = notices.len();
        self.publish(notices);
        Ok(removed)
    }

    fn ensure_running(&self) -> CacheResult<()> {
        match self.state() {
            CacheState::Running => Ok(()),
            other => Err(CacheError::CacheClosed(other)),
        }
    }

    fn transition(&self, next: CacheState) {
        let previous = self.state.swap(next as u8, Ordering::AcqRel);
        log::debug!(
            "Cache state {} -> {}",
            CacheState::from_u8(previous).unwrap_or(CacheState::Stopped),
            next
        );
    }

    /// Undo a `Draining` transition unless another shutdown finished first.
    fn abandon_drain(&self) {
        let restored = self
            .state
            .compare_exchange(
                CacheState::Draining as u8,
                CacheState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if restored {
            log::debug!("Cache state {} -> {}", CacheState::Draining, CacheState::Running);
        }
    }

    fn refresh_gauges(&self, indexes: &CacheIndexes) {
        self.counters
            .valid_entries
            .store(indexes.valid_index.len(), Ordering::Relaxed);
        self.counters
            .transaction_entries
            .store(indexes.transaction_index.len(), Ordering::Relaxed);
    }

    fn indexes_ref(&self) -> RwLockReadGuard<'_, CacheIndexes> {
        self.indexes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn indexes_mut(&self) -> RwLockWriteGuard<'_, CacheIndexes> {
        self.indexes.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending_queue(&self) -> std::sync::MutexGuard<'_, Vec<RemovalNotice>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue notices and deliver everything queued. Called with no lock held.
    fn publish(&self, notices: Vec<RemovalNotice>) {
        if notices.is_empty() {
            return;
        }
        let batch = {
            let mut pending = self.pending_queue();
            pending.extend(notices);
            std::mem::take(&mut *pending)
        };
        self.deliver(batch);
    }

    fn deliver(&self, notices: Vec<RemovalNotice>) {
        if notices.is_empty() {
            return;
        }
        let listeners: Vec<Arc<dyn CacheEntryListener>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for notice in &notices {
            for listener in &listeners {
                if let Err(e) = listener.on_removed(notice) {
                    log::warn!(
                        "Listener failed on {} removal of {}: {}",
                        notice.cause,
                        notice.identifier,
                        e
                    );
                }
            }
        }
    }
}

impl<V> std::fmt::Debug for BitemporalCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitemporalCache")
            .field(
                "state",
                &CacheState::from_u8(self.state.load(Ordering::Acquire)),
            )
            .field("lock", &self.lock)
            .finish()
    }
}
