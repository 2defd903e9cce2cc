//! The authoritative-read collaborator consulted on a read-through miss.

use crate::types::{CacheRecord, CacheResult, Identifier};

/// Reads an object version from the system of record.
///
/// Returns the version valid at `valid_time` as recorded at
/// `transaction_time`, or None if the object does not exist there.
pub trait ObjectReader<V> {
    fn read_object(
        &self,
        identifier: &Identifier,
        valid_time: u64,
        transaction_time: u64,
    ) -> CacheResult<Option<CacheRecord<V>>>;
}

impl<V, F> ObjectReader<V> for F
where
    F: Fn(&Identifier, u64, u64) -> CacheResult<Option<CacheRecord<V>>>,
{
    fn read_object(
        &self,
        identifier: &Identifier,
        valid_time: u64,
        transaction_time: u64,
    ) -> CacheResult<Option<CacheRecord<V>>> {
        self(identifier, valid_time, transaction_time)
    }
}
