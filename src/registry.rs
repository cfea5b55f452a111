//! Provides a registry which manages a set of named LRU caches for string keys and values.
//!
//! The caches are defined in the system config and the registry follows all changes of the
//! config once [install](install) has been invoked.
//!
//! # Configuration
//! In the system config, an object named **caches** has to be present which specifies the
//! settings for each cache:
//!
//! ```yaml
//! caches:
//!     my_cache:
//!         # Specifies the maximal number of entries to store.
//!         # Supports the suffixes k (thousand) and m (million).
//!         size: 10k
//! ```
//!
//! As the capacity of a cache cannot be changed once it has been created, a cache whose size
//! is changed is re-created (and therefore starts empty). Caches which are no longer present in
//! the config are dropped. Note however, that callers which still hold a reference to a dropped
//! cache can continue to use it until they release it.
//!
//! # Examples
//! ```
//! # use lruvault::config::Config;
//! # use lruvault::registry::CacheRegistry;
//! let config = Config::new("settings.yml");
//! config.load_from_string("
//! caches:
//!     sessions:
//!         size: 1024
//! ", None).unwrap();
//!
//! let registry = CacheRegistry::new();
//! registry.apply_config(config.current().query("caches"));
//!
//! let sessions = registry.require("sessions").unwrap();
//! sessions.put("Foo".to_owned(), "Bar".to_owned());
//! assert_eq!(sessions.get("Foo"), Some("Bar".to_owned()));
//! assert_eq!(sessions.capacity(), 1024);
//! ```
use std::sync::Arc;

use arc_swap::ArcSwap;
use fnv::FnvHashMap;
use tokio::sync::broadcast::error::RecvError;
use yaml_rust::Yaml;

use crate::config::Config;
use crate::fmt::parse_count;
use crate::lru::SyncLRUCache;

/// We operate on caches which store plain Strings.
pub type StringCache = SyncLRUCache<String, String>;

const SEPARATOR: &str =
    "-------------------------------------------------------------------------------\n";

/// Contains a set of named caches.
///
/// Lookups never block, as the set of caches is swapped atomically whenever the config changes.
pub struct CacheRegistry {
    caches: ArcSwap<FnvHashMap<String, Arc<StringCache>>>,
}

impl CacheRegistry {
    /// Creates a new and empty registry.
    pub fn new() -> Self {
        CacheRegistry {
            caches: ArcSwap::from_pointee(FnvHashMap::default()),
        }
    }

    /// Returns the cache with the given name.
    pub fn find(&self, name: &str) -> Option<Arc<StringCache>> {
        self.caches.load().get(name).cloned()
    }

    /// Returns the cache with the given name or yields an appropriate error.
    pub fn require(&self, name: &str) -> anyhow::Result<Arc<StringCache>> {
        self.find(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown cache: {}", name))
    }

    /// Returns the names of all known caches in alphabetical order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.load().keys().cloned().collect();
        names.sort();

        names
    }

    /// Updates the set of caches based on the given **caches** object of the system config.
    ///
    /// Note that this provides a safety mechanism. If no config object at all is present,
    /// we leave the current caches untouched. This prevents the system from wiping all caches
    /// in the case of an accidental change or an invalid config.
    pub fn apply_config(&self, caches: &Yaml) {
        match caches {
            Yaml::Hash(map) => self.parse_config(map),
            _ => log::info!("Config does not contain a 'caches' object. Skipping config update."),
        }
    }

    /// Actually loads the configuration for the caches now that we've verified that a config is
    /// present.
    ///
    /// The new set of caches is always derived from the set which is replaced, so that concurrent
    /// updates agree on which instance of a cache is kept.
    fn parse_config(&self, map: &yaml_rust::yaml::Hash) {
        let mut updated: Arc<FnvHashMap<String, Arc<StringCache>>> = Arc::default();
        let previous = self.caches.rcu(|current| {
            updated = Arc::new(derive_caches(map, current));
            updated.clone()
        });

        for name in previous.keys().filter(|name| !updated.contains_key(*name)) {
            log::info!("Dropping stale cache {}...", name);
        }
    }

    /// Renders an overview of all caches.
    ///
    /// # Examples
    /// ```
    /// # use lruvault::registry::CacheRegistry;
    /// let registry = CacheRegistry::new();
    /// assert_eq!(registry.report().contains("Num Entries"), true);
    /// ```
    pub fn report(&self) -> String {
        let mut result = String::new();

        result += format!(
            "{:<30} {:>12} {:>12} {:>12}\n",
            "Name", "Num Entries", "Max Entries", "Hit Rate"
        )
        .as_str();
        result += SEPARATOR;

        let caches = self.caches.load();
        for name in self.names() {
            if let Some(cache) = caches.get(&name) {
                let stats = cache.stats();
                result += format!(
                    "{:<30} {:>12} {:>12} {:>10.2} %\n",
                    name,
                    stats.num_entries,
                    stats.capacity,
                    stats.hit_rate()
                )
                .as_str();
            }
        }
        result += SEPARATOR;

        result
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        CacheRegistry::new()
    }
}

/// Determines the size of a cache from its settings.
fn parse_size(settings: &Yaml) -> anyhow::Result<usize> {
    match &settings["size"] {
        Yaml::Integer(size) => usize::try_from(*size)
            .map_err(|_| anyhow::anyhow!("'size' must not be negative but was {}.", size)),
        Yaml::String(size) => parse_count(size),
        Yaml::BadValue => Err(anyhow::anyhow!("No cache size was given.")),
        other => Err(anyhow::anyhow!("Cannot parse 'size': {:?}", other)),
    }
}

/// Creates or updates the cache with the given name based on the given settings.
///
/// In case of an invalid config, it leaves the current cache untouched. Therefore this will not
/// create a cache with an invalid or partial config. But it will also not damage or wipe an
/// active cache due to an accident or config problem.
fn create_or_update(
    name: &str,
    current_cache: Option<Arc<StringCache>>,
    settings: &Yaml,
) -> Option<Arc<StringCache>> {
    let size = match parse_size(settings) {
        Ok(size) => size,
        Err(error) => {
            log::error!("Not going to create or update {}: {}", name, error);
            return current_cache;
        }
    };

    match current_cache {
        Some(cache) if cache.capacity() == size => Some(cache),
        Some(cache) => match create(name, size) {
            Some(new_cache) => {
                log::info!(
                    "Re-created {} as its size changed from {} to {}.",
                    name,
                    cache.capacity(),
                    size
                );
                Some(new_cache)
            }
            None => Some(cache),
        },
        None => {
            log::info!("Creating new cache {}...", name);
            create(name, size)
        }
    }
}

fn derive_caches(
    map: &yaml_rust::yaml::Hash,
    current: &FnvHashMap<String, Arc<StringCache>>,
) -> FnvHashMap<String, Arc<StringCache>> {
    let mut result = FnvHashMap::default();

    for (name, settings) in map {
        let name = match name.as_str() {
            Some(name) => name,
            None => {
                log::error!("Ignoring a cache with an invalid name: {:?}", name);
                continue;
            }
        };

        if let Some(cache) = create_or_update(name, current.get(name).cloned(), settings) {
            let _ = result.insert(name.to_owned(), cache);
        }
    }

    result
}

fn create(name: &str, size: usize) -> Option<Arc<StringCache>> {
    match StringCache::new(size) {
        Ok(cache) => Some(Arc::new(cache)),
        Err(error) => {
            log::error!("Not going to create or update {}: {}", name, error);
            None
        }
    }
}

/// Applies the current config to the given registry and keeps it up to date.
///
/// This spawns a task which re-applies the **caches** object of the config each time a change
/// is signalled by the config. The task terminates once the config has been dropped. Note that
/// this has to be called from within a tokio runtime.
pub fn install(registry: Arc<CacheRegistry>, config: Arc<Config>) {
    // Subscribe first, so that a config loaded while applying the current one isn't missed...
    let mut config_changed = config.notifier();
    registry.apply_config(config.current().query("caches"));

    let config = Arc::downgrade(&config);

    crate::spawn!(async move {
        loop {
            match config_changed.recv().await {
                Ok(_) | Err(RecvError::Lagged(_)) => match config.upgrade() {
                    Some(config) => registry.apply_config(config.current().query("caches")),
                    None => return,
                },
                Err(RecvError::Closed) => return,
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::registry::CacheRegistry;
    use std::sync::Arc;
    use std::time::Duration;

    fn apply(registry: &CacheRegistry, yaml: &str) {
        let config = Config::new("test.yml");
        config.load_from_string(yaml, None).unwrap();
        registry.apply_config(config.current().query("caches"));
    }

    #[test]
    fn caches_are_created_from_config() {
        let registry = CacheRegistry::new();
        apply(
            &registry,
            "
caches:
    small:
        size: 2
    large:
        size: 10k
",
        );

        assert_eq!(registry.names(), vec!["large".to_owned(), "small".to_owned()]);
        assert_eq!(registry.require("large").unwrap().capacity(), 10_000);

        let small = registry.require("small").unwrap();
        assert_eq!(small.capacity(), 2);
        let _ = small.put("a".to_owned(), "1".to_owned());
        let _ = small.put("b".to_owned(), "2".to_owned());
        let _ = small.put("c".to_owned(), "3".to_owned());
        assert_eq!(small.get("a"), None);
        assert_eq!(small.get("c"), Some("3".to_owned()));

        assert_eq!(
            registry.require("unknown").err().unwrap().to_string(),
            "Unknown cache: unknown"
        );
    }

    #[test]
    fn invalid_configs_leave_caches_untouched() {
        let registry = CacheRegistry::new();
        apply(&registry, "caches:\n    test:\n        size: 4\n");
        let _ = registry
            .require("test")
            .unwrap()
            .put("Foo".to_owned(), "Bar".to_owned());

        // Without a caches object, nothing happens at all...
        apply(&registry, "other: 1");
        assert_eq!(registry.names(), vec!["test".to_owned()]);

        // An invalid size keeps the current cache...
        for size in &["0", "-1", "foo", "1.5k"] {
            apply(&registry, &format!("caches:\n    test:\n        size: {}\n", size));
            let cache = registry.require("test").unwrap();
            assert_eq!(cache.capacity(), 4);
            assert_eq!(cache.get("Foo"), Some("Bar".to_owned()));
        }

        // ...and a missing size doesn't create a new one.
        apply(
            &registry,
            "caches:\n    test:\n        size: 4\n    other:\n        max: 5\n",
        );
        assert_eq!(registry.names(), vec!["test".to_owned()]);
    }

    #[test]
    fn changed_caches_are_recreated_or_dropped() {
        let registry = CacheRegistry::new();
        apply(
            &registry,
            "caches:\n    a:\n        size: 4\n    b:\n        size: 4\n",
        );
        let a = registry.require("a").unwrap();
        let _ = a.put("Foo".to_owned(), "Bar".to_owned());

        // Re-applying the same settings keeps the caches as they are...
        apply(
            &registry,
            "caches:\n    a:\n        size: 4\n    b:\n        size: 4\n",
        );
        assert_eq!(Arc::ptr_eq(&a, &registry.require("a").unwrap()), true);

        // Changing the size of "a" re-creates it, dropping "b" removes it...
        apply(&registry, "caches:\n    a:\n        size: 8\n");
        let new_a = registry.require("a").unwrap();
        assert_eq!(new_a.capacity(), 8);
        assert_eq!(new_a.get("Foo"), None);
        assert_eq!(registry.find("b").is_none(), true);

        // The old instance remains usable for those who still hold it...
        assert_eq!(a.get("Foo"), Some("Bar".to_owned()));
    }

    #[test]
    fn installed_registries_follow_config_changes() {
        crate::testing::test_async(async {
            let config = Arc::new(Config::new("test.yml"));
            config
                .load_from_string("caches:\n    a:\n        size: 4\n", None)
                .unwrap();

            let registry = Arc::new(CacheRegistry::new());
            crate::registry::install(registry.clone(), config.clone());
            assert_eq!(registry.names(), vec!["a".to_owned()]);

            config
                .load_from_string("caches:\n    b:\n        size: 4\n", None)
                .unwrap();

            let mut attempts = 0;
            while registry.find("b").is_none() && attempts < 100 {
                tokio::time::sleep(Duration::from_millis(10)).await;
                attempts += 1;
            }
            assert_eq!(registry.names(), vec!["b".to_owned()]);
        });
    }

    #[test]
    fn config_loads_during_install_are_not_missed() {
        crate::testing::test_async(async {
            for _ in 0..50 {
                let config = Arc::new(Config::new("test.yml"));
                config
                    .load_from_string("caches:\n    a:\n        size: 1m\n", None)
                    .unwrap();

                // Loads another config while the registry is being installed...
                let loader = {
                    let config = config.clone();
                    std::thread::spawn(move || {
                        config
                            .load_from_string("caches:\n    b:\n        size: 4\n", None)
                            .unwrap();
                    })
                };

                let registry = Arc::new(CacheRegistry::new());
                crate::registry::install(registry.clone(), config.clone());
                loader.join().unwrap();

                // ...which has to be picked up either directly or via the notifier.
                let mut attempts = 0;
                while registry.find("b").is_none() && attempts < 100 {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    attempts += 1;
                }
                assert_eq!(registry.names(), vec!["b".to_owned()]);
            }
        });
    }

    #[test]
    fn concurrent_config_updates_agree_on_one_cache_instance() {
        let registry = Arc::new(CacheRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|thread| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for round in 0..20 {
                        apply(&registry, "caches:\n    shared:\n        size: 1k\n");
                        let _ = registry
                            .require("shared")
                            .unwrap()
                            .put(format!("{}-{}", thread, round), "x".to_owned());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Every write has to end up in the one cache instance which is kept by all updates...
        let shared = registry.require("shared").unwrap();
        assert_eq!(shared.len(), 8 * 20);
        assert_eq!(shared.get("7-19"), Some("x".to_owned()));
    }

    #[test]
    fn report_lists_all_caches() {
        let registry = CacheRegistry::new();
        apply(
            &registry,
            "caches:\n    first:\n        size: 4\n    second:\n        size: 4\n",
        );

        let report = registry.report();
        assert_eq!(report.contains("first"), true);
        assert_eq!(report.contains("second"), true);
        assert_eq!(report.find("first") < report.find("second"), true);
    }
}
