//! Provides a capacity constrained LRU cache.
//!
//! An LRU cache drops the least recently used entry if it is about to grow beyond its capacity.
//! Each entry which is written or successfully read becomes the most recently used one. Therefore
//! the cache maintains a strict recency order of all its keys and the entry at the end of this
//! order is the one to be evicted next.
//!
//! The [LRUCache](LRUCache) itself is a plain single threaded data structure. It keeps its
//! entries in a recency list whose nodes are stored in a vector of slots, along with a hash map
//! which maps each key to its slot. Therefore all operations run in constant time.
//!
//! The [SyncLRUCache](SyncLRUCache) wraps a cache in a single lock so that it can be shared
//! between threads.
//!
//! Both provide metrics (reads, hits, writes, evictions) which can be obtained as a
//! [CacheStats](CacheStats) snapshot.
mod lru_cache;
mod slots;
mod stats;
mod sync_cache;

pub use lru_cache::LRUCache;
pub use stats::CacheStats;
pub use sync_cache::SyncLRUCache;
