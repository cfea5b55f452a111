use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

use crate::error::CacheError;
use crate::lru::slots::{RecencyList, SlotId};
use crate::lru::CacheStats;

/// Provides a capacity constrained LRU cache.
///
/// A cache behaves just like a **Map** as long as there is no shortage in storage. However, if
/// the max number of entries is reached, the least recently used entry will be evicted to make
/// room for a new one - hence the name LRU cache. Both, reading an entry via **get** and writing
/// it via **put** count as "using" it.
///
/// Note that this cache requires a mutable reference even for **get**, as each read updates the
/// recency order. Use a [SyncLRUCache](crate::lru::SyncLRUCache) to share a cache between
/// threads.
///
/// # Examples
/// ```
/// # use lruvault::lru::LRUCache;
/// // Specifies a cache which can store up to 2 entries...
/// let mut lru = LRUCache::new(2).unwrap();
///
/// lru.put("Foo".to_owned(), "Bar".to_owned());
/// lru.put("Foo1".to_owned(), "Bar1".to_owned());
/// assert_eq!(lru.get("Foo").unwrap(), "Bar");
///
/// // this will no longer fit..
/// lru.put("Foo2".to_owned(), "Bar2".to_owned());
///
/// // ..and therefore the least recently used entry ("Foo1") has been evicted:
/// assert_eq!(lru.get("Foo").is_some(), true);
/// assert_eq!(lru.get("Foo1").is_some(), false);
/// assert_eq!(lru.get("Foo2").is_some(), true);
///```
pub struct LRUCache<K, V, S = RandomState> {
    capacity: usize,
    reads: usize,
    hits: usize,
    writes: usize,
    evictions: usize,
    index: HashMap<K, SlotId, S>,
    entries: RecencyList<K, V>,
}

impl<K: Hash + Eq + Clone, V> LRUCache<K, V> {
    /// Creates a new cache which can store up to **capacity** entries.
    ///
    /// # Errors
    /// Fails with **InvalidCapacity** if the given capacity is zero.
    ///
    /// # Examples
    /// ```
    /// # use lruvault::lru::LRUCache;
    /// # use lruvault::error::CacheError;
    /// let lru = LRUCache::<String, String>::new(128).unwrap();
    /// assert_eq!(lru.capacity(), 128);
    /// assert_eq!(lru.is_empty(), true);
    ///
    /// // A cache has to hold at least one entry...
    /// assert_eq!(LRUCache::<String, String>::new(0).err(), Some(CacheError::InvalidCapacity(0)));
    ///```
    pub fn new(capacity: usize) -> Result<Self, CacheError> {
        Self::with_hasher(capacity, RandomState::new())
    }
}

impl<K: Hash + Eq + Clone, V, S: BuildHasher> LRUCache<K, V, S> {
    /// Creates a new cache which uses the given hash builder for its key index.
    ///
    /// # Errors
    /// Fails with **InvalidCapacity** if the given capacity is zero.
    pub fn with_hasher(capacity: usize, hash_builder: S) -> Result<Self, CacheError> {
        if capacity == 0 {
            return Err(CacheError::InvalidCapacity(capacity));
        }

        Ok(LRUCache {
            capacity,
            reads: 0,
            hits: 0,
            writes: 0,
            evictions: 0,
            index: HashMap::with_capacity_and_hasher(capacity, hash_builder),
            entries: RecencyList::with_capacity(capacity),
        })
    }

    /// Stores the given value for the given key and marks the entry as most recently used.
    ///
    /// Returns **true** if a value was already present for the key (which has now been
    /// replaced) or **false** if a new entry was created. In the latter case, the least recently
    /// used entry is evicted if the cache was already full. Replacing a value never evicts
    /// another entry.
    ///
    /// # Examples
    /// ```
    /// # use lruvault::lru::LRUCache;
    /// let mut lru = LRUCache::new(2).unwrap();
    ///
    /// assert_eq!(lru.put("a", 1), false);
    /// assert_eq!(lru.put("a", 2), true);
    /// assert_eq!(lru.get("a"), Some(&2));
    /// assert_eq!(lru.len(), 1);
    ///```
    pub fn put(&mut self, key: K, value: V) -> bool {
        self.writes += 1;

        if let Some(id) = self.index.get(&key).copied() {
            if let Some(current) = self.entries.get_mut(id) {
                *current = value;
                let _ = self.entries.move_to_front(id);
                return true;
            }
        }

        let id = self.entries.push_front(key.clone(), value);
        let _ = self.index.insert(key, id);
        self.enforce_constraints();

        false
    }

    fn enforce_constraints(&mut self) {
        while self.entries.len() > self.capacity {
            match self.entries.pop_back() {
                Some((key, _)) => {
                    let _ = self.index.remove(&key);
                    self.evictions += 1;
                }
                None => unreachable!("Failed to enforce constraints of a LRU cache!"),
            }
        }
    }

    /// Returns the value which has previously been stored for the given key or **None** if
    /// no value is present.
    ///
    /// If a value is found, its entry becomes the most recently used one. A miss leaves the
    /// cache untouched (apart from the metrics).
    ///
    /// # Examples
    /// ```
    /// # use lruvault::lru::LRUCache;
    /// let mut lru = LRUCache::new(2).unwrap();
    /// lru.put("a", 1);
    /// lru.put("b", 2);
    ///
    /// // Reading "a" saves it from being evicted...
    /// assert_eq!(lru.get("a"), Some(&1));
    /// lru.put("c", 3);
    ///
    /// // ..so that "b" has to go instead.
    /// assert_eq!(lru.get("b"), None);
    /// assert_eq!(lru.get("a"), Some(&1));
    /// assert_eq!(lru.get("c"), Some(&3));
    ///```
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.reads += 1;

        let id = *self.index.get(key)?;
        if !self.entries.move_to_front(id) {
            return None;
        }

        self.hits += 1;
        self.entries.get(id).map(|(_, value)| value)
    }

    /// Returns the value stored for the given key without marking it as used.
    ///
    /// In contrast to **get** this neither changes the recency order nor the metrics.
    ///
    /// # Examples
    /// ```
    /// # use lruvault::lru::LRUCache;
    /// let mut lru = LRUCache::new(2).unwrap();
    /// lru.put("a", 1);
    /// lru.put("b", 2);
    ///
    /// // Peeking at "a" doesn't save it...
    /// assert_eq!(lru.peek("a"), Some(&1));
    /// lru.put("c", 3);
    /// assert_eq!(lru.peek("a"), None);
    /// assert_eq!(lru.reads(), 0);
    ///```
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let id = *self.index.get(key)?;
        self.entries.get(id).map(|(_, value)| value)
    }

    /// Determines if a value is stored for the given key without marking it as used.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(key)
    }

    /// Returns the least recently used entry, which is the one to be evicted next.
    ///
    /// # Examples
    /// ```
    /// # use lruvault::lru::LRUCache;
    /// let mut lru = LRUCache::new(3).unwrap();
    /// assert_eq!(lru.lru(), None);
    ///
    /// lru.put("a", 1);
    /// lru.put("b", 2);
    /// assert_eq!(lru.lru(), Some((&"a", &1)));
    ///
    /// lru.get("a");
    /// assert_eq!(lru.lru(), Some((&"b", &2)));
    /// ```
    pub fn lru(&self) -> Option<(&K, &V)> {
        self.entries.back().and_then(|id| self.entries.get(id))
    }

    /// Removes the entry for the given key if present and returns its value.
    ///
    /// # Examples
    /// ```
    /// # use lruvault::lru::LRUCache;
    /// let mut lru = LRUCache::new(128).unwrap();
    ///
    /// // After inserting a value...
    /// lru.put("Foo".to_owned(), "Bar".to_owned());
    /// // ..it can be retrieved.
    /// assert_eq!(lru.get("Foo").unwrap(), "Bar");
    ///
    /// // However, once it is removed...
    /// assert_eq!(lru.remove("Foo"), Some("Bar".to_owned()));
    /// // ..it's no longer accessible.
    /// assert_eq!(lru.get("Foo"), None);
    /// ```
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.writes += 1;

        let id = self.index.remove(key)?;
        self.entries.remove(id).map(|(_, value)| value)
    }

    /// Removes all entries in this cache.
    ///
    /// Note that this will also zero all metrics (reads, writes, cache hits, evictions).
    pub fn flush(&mut self) {
        self.index.clear();
        self.entries.clear();
        self.reads = 0;
        self.writes = 0;
        self.hits = 0;
        self.evictions = 0;
    }

    /// Iterates over all entries, starting with the most recently used one.
    ///
    /// Iterating doesn't mark any entry as used.
    ///
    /// # Examples
    /// ```
    /// # use lruvault::lru::LRUCache;
    /// let mut lru = LRUCache::new(3).unwrap();
    /// lru.put("a", 1);
    /// lru.put("b", 2);
    /// lru.put("c", 3);
    /// lru.get("a");
    ///
    /// let keys: Vec<_> = lru.iter().map(|(key, _)| *key).collect();
    /// assert_eq!(keys, vec!["a", "c", "b"]);
    /// ```
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&K, &V)> + '_ {
        self.entries.iter()
    }

    /// Returns the number of elements in the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Determines if the cache is completely empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns to overall capacity (max number of entries) of this cache.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the total number of reads performed on this cache since the last flush.
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Returns the total number of writes performed on this cache since the last flush.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Returns the number of entries which have been evicted since the last flush.
    pub fn evictions(&self) -> usize {
        self.evictions
    }

    /// Returns a snapshot of all metrics of this cache.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            num_entries: self.len(),
            capacity: self.capacity,
            reads: self.reads,
            hits: self.hits,
            writes: self.writes,
            evictions: self.evictions,
        }
    }

    /// Verifies that the key index and the recency list are consistent.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        self.entries.assert_links();

        assert!(self.len() <= self.capacity, "Capacity exceeded");
        assert_eq!(self.index.len(), self.entries.len());

        let mut seen = std::collections::HashSet::new();
        for (key, _) in self.entries.iter() {
            assert!(seen.insert(key), "Duplicate key in recency list");
            let id = self.index.get(key).copied();
            assert!(id.is_some(), "Key of recency list is missing in the index");
        }
        for (key, id) in self.index.iter() {
            match self.entries.get(*id) {
                Some((stored_key, _)) => assert!(stored_key == key, "Index points to wrong entry"),
                None => panic!("Index contains a stale handle"),
            }
        }
    }
}
