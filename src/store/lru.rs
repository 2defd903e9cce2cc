//! Capacity-bounded least-recently-used payload store.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::PayloadStore;

struct LruInner<K, V> {
    /// Value and last-use tick per key.
    entries: HashMap<K, (V, u64)>,
    /// Keys ordered by last use, oldest first.
    recency: BTreeMap<u64, K>,
    /// Monotonic use counter.
    tick: u64,
}

impl<K: Hash + Eq + Clone, V> LruInner<K, V> {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn touch(&mut self, key: &K) {
        let tick = self.next_tick();
        if let Some((_, last)) = self.entries.get_mut(key) {
            self.recency.remove(&*last);
            *last = tick;
            self.recency.insert(tick, key.clone());
        }
    }
}

/// A payload store that evicts the least recently used value once it holds
/// more than `capacity` values.
pub struct LruPayloadStore<K, V> {
    inner: Mutex<LruInner<K, V>>,
    capacity: usize,
}

impl<K: Hash + Eq + Clone, V> LruPayloadStore<K, V> {
    /// Create an empty store. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruInner {
                entries: HashMap::new(),
                recency: BTreeMap::new(),
                tick: 0,
            }),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruInner<K, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, V> PayloadStore<K, V> for LruPayloadStore<K, V>
where
    K: Hash + Eq + Clone + Send,
    V: Clone + Send,
{
    fn put(&self, key: K, value: V) -> Vec<K> {
        let mut inner = self.lock();
        let tick = inner.next_tick();
        if let Some((_, last)) = inner.entries.insert(key.clone(), (value, tick)) {
            inner.recency.remove(&last);
        }
        inner.recency.insert(tick, key);

        let mut evicted = Vec::new();
        while inner.entries.len() > self.capacity {
            let Some((_, oldest)) = inner.recency.pop_first() else {
                break;
            };
            inner.entries.remove(&oldest);
            evicted.push(oldest);
        }
        evicted
    }

    fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.lock();
        let value = inner.entries.get(key).map(|(v, _)| v.clone())?;
        inner.touch(key);
        Some(value)
    }

    fn remove(&self, key: &K) -> Option<V> {
        let mut inner = self.lock();
        let (value, last) = inner.entries.remove(key)?;
        inner.recency.remove(&last);
        Some(value)
    }

    fn len(&self) -> usize {
        self.lock().entries.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.recency.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_least_recently_used() {
        let store: LruPayloadStore<&str, u32> = LruPayloadStore::new(2);
        assert!(store.put("a", 1).is_empty());
        assert!(store.put("b", 2).is_empty());
        assert_eq!(store.get(&"a"), Some(1));

        let evicted = store.put("c", 3);
        assert_eq!(evicted, vec!["b"]);
        assert_eq!(store.get(&"b"), None);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_replace_does_not_evict() {
        let store: LruPayloadStore<&str, u32> = LruPayloadStore::new(1);
        assert!(store.put("a", 1).is_empty());
        assert!(store.put("a", 2).is_empty());
        assert_eq!(store.get(&"a"), Some(2));
    }

    #[test]
    fn test_remove_and_clear() {
        let store: LruPayloadStore<u64, String> = LruPayloadStore::new(4);
        store.put(1, "one".to_string());
        store.put(2, "two".to_string());
        assert_eq!(store.remove(&1), Some("one".to_string()));
        assert_eq!(store.remove(&1), None);
        store.clear();
        assert!(store.is_empty());
    }
}
