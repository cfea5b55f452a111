use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};

use parking_lot::Mutex;

use crate::error::CacheError;
use crate::lru::{CacheStats, LRUCache};

/// Wraps an [LRUCache] so that it can be shared between threads.
///
/// All operations (including **get**, as it updates the recency order) are serialized by a
/// single lock which guards the whole cache. Therefore all operations are linearizable: any
/// set of concurrent calls behaves as if they had been executed one after another. The lock is
/// only held for the duration of a single (constant time) operation and it is released on every
/// exit path, even if a panic unwinds through it.
///
/// As no reference into the cache may escape the lock, values are either cloned out
/// (**get**, **peek**) or handed to a closure while the lock is held (**get_with**).
///
/// # Examples
/// ```
/// # use lruvault::lru::SyncLRUCache;
/// # use std::sync::Arc;
/// let cache = Arc::new(SyncLRUCache::new(2).unwrap());
///
/// let handles: Vec<_> = (0..4)
///     .map(|i| {
///         let cache = cache.clone();
///         std::thread::spawn(move || cache.put(format!("Key{}", i), i))
///     })
///     .collect();
/// for handle in handles {
///     handle.join().unwrap();
/// }
///
/// // Only the two entries written last survived...
/// assert_eq!(cache.len(), 2);
/// ```
pub struct SyncLRUCache<K, V, S = RandomState> {
    inner: Mutex<LRUCache<K, V, S>>,
}

impl<K: Hash + Eq + Clone, V> SyncLRUCache<K, V> {
    /// Creates a new cache which can store up to **capacity** entries.
    ///
    /// # Errors
    /// Fails with **InvalidCapacity** if the given capacity is zero.
    pub fn new(capacity: usize) -> Result<Self, CacheError> {
        Ok(SyncLRUCache::from(LRUCache::new(capacity)?))
    }
}

impl<K, V, S> From<LRUCache<K, V, S>> for SyncLRUCache<K, V, S> {
    fn from(cache: LRUCache<K, V, S>) -> Self {
        SyncLRUCache {
            inner: Mutex::new(cache),
        }
    }
}

impl<K: Hash + Eq + Clone, V, S: BuildHasher> SyncLRUCache<K, V, S> {
    /// Stores the given value for the given key.
    ///
    /// Returns **true** if a value was replaced, **false** if a new entry was created. See
    /// [LRUCache::put] for details.
    pub fn put(&self, key: K, value: V) -> bool {
        self.inner.lock().put(key, value)
    }

    /// Returns a copy of the value stored for the given key and marks the entry as used.
    ///
    /// # Examples
    /// ```
    /// # use lruvault::lru::SyncLRUCache;
    /// let cache = SyncLRUCache::new(2).unwrap();
    /// cache.put("a", 1);
    /// cache.put("b", 2);
    /// assert_eq!(cache.get("a"), Some(1));
    ///
    /// cache.put("c", 3);
    /// assert_eq!(cache.get("b"), None);
    /// ```
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.inner.lock().get(key).cloned()
    }

    /// Invokes the given closure with the value stored for the given key and marks the entry as
    /// used.
    ///
    /// This permits to inspect values which are expensive (or impossible) to clone. Note that
    /// the lock is held while the closure runs, so it should be short.
    ///
    /// # Examples
    /// ```
    /// # use lruvault::lru::SyncLRUCache;
    /// let cache = SyncLRUCache::new(2).unwrap();
    /// cache.put("a", vec![1, 2, 3]);
    /// assert_eq!(cache.get_with("a", |value| value.len()), Some(3));
    /// assert_eq!(cache.get_with("b", |value| value.len()), None);
    /// ```
    pub fn get_with<Q, R, F>(&self, key: &Q, callback: F) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&V) -> R,
    {
        self.inner.lock().get(key).map(callback)
    }

    /// Returns a copy of the value stored for the given key without marking it as used.
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.inner.lock().peek(key).cloned()
    }

    /// Determines if a value is stored for the given key without marking it as used.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().contains(key)
    }

    /// Returns a copy of the least recently used entry, which is the one to be evicted next.
    pub fn lru(&self) -> Option<(K, V)>
    where
        V: Clone,
    {
        self.inner
            .lock()
            .lru()
            .map(|(key, value)| (key.clone(), value.clone()))
    }

    /// Removes the entry for the given key if present and returns its value.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().remove(key)
    }

    /// Removes all entries and resets all metrics.
    pub fn flush(&self) {
        self.inner.lock().flush();
    }

    /// Returns the number of elements in the cache.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Determines if the cache is completely empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Returns to overall capacity (max number of entries) of this cache.
    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity()
    }

    /// Returns a snapshot of all metrics of this cache.
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats()
    }

    /// Consumes the wrapper and returns the underlying cache.
    pub fn into_inner(self) -> LRUCache<K, V, S> {
        self.inner.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use crate::error::CacheError;
    use crate::lru::SyncLRUCache;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn basic_operations_work() {
        let cache = SyncLRUCache::new(2).unwrap();
        assert_eq!(cache.put("a".to_owned(), 1), false);
        assert_eq!(cache.put("b".to_owned(), 2), false);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.put("c".to_owned(), 3), false);

        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("c"), Some(3));
        assert_eq!(cache.lru(), Some(("a".to_owned(), 1)));

        assert_eq!(cache.put("a".to_owned(), 4), true);
        assert_eq!(cache.peek("a"), Some(4));
        assert_eq!(cache.lru(), Some(("c".to_owned(), 3)));
        assert_eq!(cache.remove("c"), Some(3));
        assert_eq!(cache.contains("c"), false);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.capacity(), 2);

        cache.flush();
        assert_eq!(cache.is_empty(), true);
        assert_eq!(cache.stats().reads, 0);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(
            SyncLRUCache::<u32, u32>::new(0).err(),
            Some(CacheError::InvalidCapacity(0))
        );
    }

    #[test]
    fn concurrent_writes_to_the_same_key_keep_one_value() {
        let cache = Arc::new(SyncLRUCache::new(2).unwrap());

        let handles: Vec<_> = (0..100)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    let _ = cache.put("shared", i * 7 + 3);
                    i * 7 + 3
                })
            })
            .collect();
        let written: HashSet<i32> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();
        assert_eq!(written.len(), 100);

        let value = cache.get("shared").unwrap();
        assert_eq!(written.contains(&value), true);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().writes, 100);
    }

    #[test]
    fn concurrent_mixed_operations_keep_the_cache_consistent() {
        let cache = Arc::new(SyncLRUCache::new(16).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|thread| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..1_000 {
                        let key = (thread * 7 + i) % 64;
                        if i % 3 == 0 {
                            let _ = cache.get(&key);
                        } else {
                            let _ = cache.put(key, thread);
                        }
                        assert_eq!(cache.len() <= 16, true);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let lru = Arc::try_unwrap(cache)
            .ok()
            .map(|cache| cache.into_inner())
            .unwrap();
        lru.assert_invariants();
        assert_eq!(lru.len(), 16);

        let keys: HashSet<_> = lru.iter().map(|(key, _)| *key).collect();
        assert_eq!(keys.len(), 16);
    }

    #[test]
    fn a_panicking_callback_releases_the_lock() {
        let cache = Arc::new(SyncLRUCache::new(2).unwrap());
        let _ = cache.put(1, 1);

        let cloned = cache.clone();
        let result = std::thread::spawn(move || {
            cloned.get_with(&1, |_| panic!("Boom"));
        })
        .join();
        assert_eq!(result.is_err(), true);

        // The cache is still usable...
        assert_eq!(cache.put(2, 2), false);
        assert_eq!(cache.get(&1), Some(1));
    }
}
