//! lruvault provides a thread-safe, fixed-capacity LRU cache.
//!
//! # Introduction
//! An LRU (least recently used) cache behaves like a map which is limited to a fixed number of
//! entries. Once it is full, each newly inserted key pushes out the entry which has not been
//! written or read for the longest time. All operations (lookup, insert, update and eviction) run
//! in constant time.
//!
//! # Modules
//! * **LRU-Cache**: The cache itself as plain data structure ([LRUCache](lru::LRUCache)) and as
//!   a thread-safe wrapper ([SyncLRUCache](lru::SyncLRUCache)) which serializes all calls
//!   through a single lock. See [crate::lru].
//! * **Registry**: A set of named caches which is defined in and kept in sync with the system
//!   configuration. See [crate::registry].
//! * **Config**: A reload-aware YAML configuration which permits to change the set of caches
//!   during operation. See [crate::config].
//!
//! # Examples
//! ```
//! # use lruvault::lru::SyncLRUCache;
//! let cache = SyncLRUCache::new(2).unwrap();
//!
//! cache.put("a", 1);
//! cache.put("b", 2);
//!
//! // Reading "a" makes "b" the least recently used entry...
//! assert_eq!(cache.get("a"), Some(1));
//!
//! // ..which is therefore evicted once another entry is added.
//! cache.put("c", 3);
//! assert_eq!(cache.get("b"), None);
//! assert_eq!(cache.len(), 2);
//! ```
#![deny(
    missing_docs,
    trivial_casts,
    unused_extern_crates,
    unused_import_braces
)]
use simplelog::{format_description, ConfigBuilder, LevelFilter, SimpleLogger};
use std::sync::Once;

pub mod config;
pub mod error;
pub mod fmt;
pub mod lru;
pub mod registry;

/// Contains the version of the lruvault library.
pub const LRUVAULT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initializes the logging system.
///
/// This installs a **SimpleLogger** which logs to stdout. Calling this more than once is a
/// no-op.
pub fn init_logging() {
    static INIT_LOGGING: Once = Once::new();

    // We need to do this as otherwise the tests might crash as the logging system
    // is initialized several times...
    INIT_LOGGING.call_once(|| {
        if let Err(error) = SimpleLogger::init(
            LevelFilter::Debug,
            ConfigBuilder::new()
                .set_time_format_custom(format_description!(
                    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]"
                ))
                .set_thread_level(LevelFilter::Trace)
                .set_target_level(LevelFilter::Error)
                .set_location_level(LevelFilter::Trace)
                .build(),
        ) {
            eprintln!("Failed to initialize logging system: {}", error);
        }
    });
}

/// Provides a simple macro to execute an async lambda within `tokio::spawn`.
///
/// Note that this also applies std::mem::drop on the returned join handle to make
/// clippy happy.
///
/// # Example
/// ```rust
/// # #[macro_use] extern crate lruvault;
/// # #[tokio::main]
/// # async fn main() {
/// spawn!(async move {
///     // perform some async stuff here...
/// });
/// # }
/// ```
#[macro_export]
macro_rules! spawn {
    ($e:expr) => {{
        std::mem::drop(tokio::spawn($e));
    }};
}
