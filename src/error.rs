//! Defines the errors reported by the caches of this crate.
//!
//! Note that only the construction of a cache can fail. Missing keys or evictions are no errors
//! but regular outcomes of the respective operations. Everything concerned with loading and
//! parsing configuration data reports an **anyhow::Error** instead.
use thiserror::Error;

/// Enumerates the errors which can occur when creating a cache.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheError {
    /// Signals that a cache was requested which cannot hold a single entry.
    #[error("Cannot create a cache with a capacity of {0}. At least one entry has to fit.")]
    InvalidCapacity(usize),
}
