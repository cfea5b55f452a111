use std::fmt;
use std::fmt::Display;

/// Contains a snapshot of the metrics of a cache.
///
/// This is obtained via [LRUCache::stats](crate::lru::LRUCache::stats) or
/// [SyncLRUCache::stats](crate::lru::SyncLRUCache::stats). Being a plain copy, it doesn't change
/// once the cache is modified afterwards.
///
/// # Examples
/// ```
/// # use lruvault::lru::LRUCache;
/// let mut lru = LRUCache::new(4).unwrap();
/// lru.put("A", 1);
/// lru.put("B", 2);
/// assert_eq!(lru.get("A"), Some(&1));
/// assert_eq!(lru.get("C"), None);
///
/// let stats = lru.stats();
/// assert_eq!(stats.num_entries, 2);
/// assert_eq!(stats.reads, 2);
/// assert_eq!(stats.hits, 1);
/// assert_eq!(stats.writes, 2);
/// assert_eq!(stats.hit_rate().round() as i32, 50);
/// assert_eq!(stats.utilization().round() as i32, 50);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// The number of entries in the cache.
    pub num_entries: usize,
    /// The max number of entries permitted in the cache.
    pub capacity: usize,
    /// The number of lookups performed since the last flush.
    pub reads: usize,
    /// The number of lookups which found a value.
    pub hits: usize,
    /// The number of puts and removals performed since the last flush.
    pub writes: usize,
    /// The number of entries which have been dropped to make room for new ones.
    pub evictions: usize,
}

impl CacheStats {
    /// Returns the cache utilization in percent.
    pub fn utilization(&self) -> f32 {
        match self.capacity {
            0 => 0.,
            n => self.num_entries as f32 / n as f32 * 100.,
        }
    }

    /// Returns the cache hit rate in percent.
    pub fn hit_rate(&self) -> f32 {
        match self.reads {
            0 => 0.,
            n => self.hits as f32 / n as f32 * 100.,
        }
    }

    /// Returns the write read ratio in percent.
    ///
    /// This simply computes how many of the operations were writes. A healthy cache has way more
    /// reads than writes, therefore this might be a helpful metric.
    pub fn write_read_ratio(&self) -> f32 {
        match self.reads {
            0 => 100.,
            n => self.writes as f32 / (self.writes + n) as f32 * 100.,
        }
    }
}

impl Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<30} {:>20}", "Num Entries", self.num_entries)?;
        writeln!(f, "{:<30} {:>20}", "Max Entries", self.capacity)?;
        writeln!(f, "{:<30} {:>18.2} %", "Utilization", self.utilization())?;
        writeln!(f, "{:<30} {:>20}", "Reads", self.reads)?;
        writeln!(f, "{:<30} {:>20}", "Writes", self.writes)?;
        writeln!(f, "{:<30} {:>20}", "Evictions", self.evictions)?;
        writeln!(f, "{:<30} {:>18.2} %", "Hit Rate", self.hit_rate())?;
        writeln!(
            f,
            "{:<30} {:>18.2} %",
            "Write/Read Ratio",
            self.write_read_ratio()
        )
    }
}
