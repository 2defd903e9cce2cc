//! The paired valid-time / transaction-time indexes and per-record metadata.
//!
//! Every method here assumes the caller holds the matching hold on the
//! cache's upgradable lock: `&self` methods a read hold, `&mut self` methods
//! the write hold.

use std::collections::{HashMap, HashSet};

use crate::index::TemporalIndex;
use crate::types::{CacheKey, CacheResult, Identifier, Interval};

/// Intervals and write order of one cached version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RecordMeta {
    pub valid: Interval,
    pub transaction: Interval,
    /// Write order; higher is newer.
    pub sequence: u64,
}

pub(crate) struct CacheIndexes {
    pub valid_index: TemporalIndex<CacheKey>,
    pub transaction_index: TemporalIndex<CacheKey>,
    records: HashMap<CacheKey, RecordMeta>,
    by_identifier: HashMap<Identifier, Vec<CacheKey>>,
    next_sequence: u64,
}

impl CacheIndexes {
    pub fn new(max_depth: u32, domain_max: u64) -> CacheResult<Self> {
        Ok(Self {
            valid_index: TemporalIndex::new(max_depth, domain_max)?,
            transaction_index: TemporalIndex::new(max_depth, domain_max)?,
            records: HashMap::new(),
            by_identifier: HashMap::new(),
            next_sequence: 0,
        })
    }

    pub fn meta(&self, key: &CacheKey) -> Option<&RecordMeta> {
        self.records.get(key)
    }

    /// Keys of every live version of `identifier`.
    pub fn keys_for(&self, identifier: &Identifier) -> Vec<CacheKey> {
        self.by_identifier
            .get(identifier)
            .cloned()
            .unwrap_or_default()
    }

    /// Keys of versions a new `(valid, transaction)` version replaces: those
    /// whose intervals cover it on both axes, or that share its key.
    /// Partially overlapping versions stay and are ranked by `lookup`.
    pub fn conflicting(
        &self,
        identifier: &Identifier,
        valid: &Interval,
        transaction: &Interval,
        key: &CacheKey,
    ) -> Vec<CacheKey> {
        self.keys_for(identifier)
            .into_iter()
            .filter(|k| {
                k == key
                    || self.records.get(k).is_some_and(|m| {
                        m.valid.covers(valid) && m.transaction.covers(transaction)
                    })
            })
            .collect()
    }

    /// Check both intervals against their index domains.
    pub fn check_intervals(&self, valid: &Interval, transaction: &Interval) -> CacheResult<()> {
        valid.check_domain(self.valid_index.domain_max())?;
        transaction.check_domain(self.transaction_index.domain_max())?;
        Ok(())
    }

    /// Insert a version into both indexes. Either both indexes gain the
    /// entry or neither does.
    pub fn insert_record(
        &mut self,
        identifier: &Identifier,
        valid: Interval,
        transaction: Interval,
    ) -> CacheResult<CacheKey> {
        self.check_intervals(&valid, &transaction)?;
        let key = CacheKey::derive(identifier, &valid, &transaction);

        self.valid_index
            .insert(identifier.clone(), valid, key.clone())?;
        if let Err(e) = self
            .transaction_index
            .insert(identifier.clone(), transaction, key.clone())
        {
            self.valid_index.remove_reference(&valid, &key);
            return Err(e);
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.records.insert(
            key.clone(),
            RecordMeta {
                valid,
                transaction,
                sequence,
            },
        );
        self.by_identifier
            .entry(identifier.clone())
            .or_default()
            .push(key.clone());
        Ok(key)
    }

    /// Remove a version from both indexes. Returns its metadata, or None if
    /// it was not present.
    pub fn remove_record(&mut self, key: &CacheKey) -> Option<RecordMeta> {
        let meta = self.records.remove(key)?;
        self.valid_index.remove_reference(&meta.valid, key);
        self.transaction_index
            .remove_reference(&meta.transaction, key);
        if let Some(keys) = self.by_identifier.get_mut(&key.identifier) {
            keys.retain(|k| k != key);
            if keys.is_empty() {
                self.by_identifier.remove(&key.identifier);
            }
        }
        Some(meta)
    }

    /// The version of `identifier` authoritative at `(valid_time,
    /// transaction_time)`: among versions hit in both indexes, the one with
    /// the narrowest valid interval, then the most recently written.
    pub fn lookup(
        &self,
        identifier: &Identifier,
        valid_time: u64,
        transaction_time: u64,
    ) -> CacheResult<Option<(CacheKey, RecordMeta)>> {
        // Both queries run before anything is filtered so an out-of-domain
        // point is rejected whatever the cache holds.
        let valid_hits = self.valid_index.query(valid_time)?;
        let transaction_hits: HashSet<&CacheKey> = self
            .transaction_index
            .query(transaction_time)?
            .into_iter()
            .filter(|e| e.identifier == *identifier)
            .map(|e| &e.reference)
            .collect();

        let best = valid_hits
            .into_iter()
            .filter(|e| e.identifier == *identifier && transaction_hits.contains(&e.reference))
            .filter_map(|e| self.records.get(&e.reference).map(|m| (&e.reference, m)))
            .min_by(|(_, a), (_, b)| {
                a.valid
                    .width()
                    .cmp(&b.valid.width())
                    .then(b.sequence.cmp(&a.sequence))
            });
        Ok(best.map(|(key, meta)| (key.clone(), *meta)))
    }

    /// Empty both indexes, returning every version removed in write order.
    pub fn drain_records(&mut self) -> Vec<(CacheKey, RecordMeta)> {
        self.valid_index.clear();
        self.transaction_index.clear();
        self.by_identifier.clear();
        let mut drained: Vec<(CacheKey, RecordMeta)> = self.records.drain().collect();
        drained.sort_by_key(|(_, meta)| meta.sequence);
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CacheError;

    fn iv(low: u64, high: u64) -> Interval {
        Interval::new(low, high).unwrap()
    }

    #[test]
    fn test_lookup_rejects_out_of_domain_on_empty_indexes() {
        let indexes = CacheIndexes::new(8, 1_000).unwrap();
        let id = Identifier::new("x");
        assert!(matches!(
            indexes.lookup(&id, 2_000, 5),
            Err(CacheError::PointOutOfDomain { point: 2_000, max: 1_000 })
        ));
        assert!(matches!(
            indexes.lookup(&id, 5, 2_000),
            Err(CacheError::PointOutOfDomain { point: 2_000, max: 1_000 })
        ));
        assert_eq!(indexes.lookup(&id, 5, 5).unwrap(), None);
    }

    #[test]
    fn test_conflicting_requires_cover_on_both_axes() {
        let mut indexes = CacheIndexes::new(8, 1_000).unwrap();
        let id = Identifier::new("x");
        let wide = indexes.insert_record(&id, iv(0, 100), Interval::open(0)).unwrap();

        let inner_key = CacheKey::derive(&id, &iv(20, 80), &Interval::open(10));
        assert_eq!(
            indexes.conflicting(&id, &iv(20, 80), &Interval::open(10), &inner_key),
            vec![wide.clone()]
        );

        let straddle_key = CacheKey::derive(&id, &iv(50, 150), &Interval::open(10));
        assert!(indexes
            .conflicting(&id, &iv(50, 150), &Interval::open(10), &straddle_key)
            .is_empty());

        // Earlier transaction start is not covered by the open(0) version.
        let bounded_key = CacheKey::derive(&id, &iv(20, 80), &iv(0, 50));
        assert!(indexes
            .conflicting(&id, &iv(20, 80), &iv(0, 50), &bounded_key)
            .is_empty());
    }

    #[test]
    fn test_lookup_prefers_narrowest_then_newest() {
        let mut indexes = CacheIndexes::new(8, 1_000).unwrap();
        let id = Identifier::new("x");
        let a = indexes.insert_record(&id, iv(0, 100), Interval::open(0)).unwrap();
        let b = indexes.insert_record(&id, iv(50, 150), Interval::open(0)).unwrap();
        let c = indexes.insert_record(&id, iv(60, 70), Interval::open(0)).unwrap();

        assert_eq!(indexes.lookup(&id, 25, 5).unwrap().map(|(k, _)| k), Some(a));
        assert_eq!(indexes.lookup(&id, 75, 5).unwrap().map(|(k, _)| k), Some(b));
        assert_eq!(indexes.lookup(&id, 65, 5).unwrap().map(|(k, _)| k), Some(c));
    }
}
