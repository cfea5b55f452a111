//! Contains the system configuration.
//!
//! Provides access to the system configuration which is loaded from a YAML file (most probably
//! **config/settings.yml**). Once [install](install) has been invoked, the file is observed for
//! changes and reloaded once a change is detected. Therefore each user of the config should attach
//! itself to the [Config::notifier](Config::notifier) and re-process the config once a change
//! message is received. The [CacheRegistry](crate::registry::CacheRegistry) does exactly that.
//!
//! Note that the **Config** struct is kind of constant and can be created once and then kept
//! around in an **Arc**. However, the handle returned by **Config::current()** should not be
//! stored, as it will not be updated once a new config has been loaded.
//!
//! # Examples
//!
//! ```
//! # use lruvault::config::Config;
//! let config = Config::new("config/settings.yml");
//! config.load_from_string("
//! caches:
//!     sessions:
//!         size: 10k
//! ", None).unwrap();
//!
//! assert_eq!(config.current().query("caches.sessions.size").as_str(), Some("10k"));
//! assert_eq!(config.current().query("caches.unknown.size").is_badvalue(), true);
//! ```
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::Context;
use arc_swap::ArcSwap;
use yaml_rust::{Yaml, YamlLoader};

/// Provides access to the system configuration.
pub struct Config {
    filename: String,
    tx: tokio::sync::broadcast::Sender<()>,
    config: ArcSwap<(Yaml, Option<SystemTime>)>,
}

/// Represents the change listener.
///
/// Internally this is simply the receiver of a broadcast. The actual message being broadcast
/// can and should be ignored. All that matters is, once a message has been received, the config
/// was changed and needs to be re-processed.
pub type ChangeNotifier = tokio::sync::broadcast::Receiver<()>;

/// Represents a handle to the currently loaded configuration.
///
/// Note that this handle should not be stored or kept around for long, as it will not be updated
/// if the underlying config changed.
pub struct Handle {
    config: Arc<(Yaml, Option<SystemTime>)>,
}

impl Config {
    /// Creates a new config reading the given file.
    ///
    /// Note that this will neither load the file nor install a change listener. This is done
    /// by [load](Config::load) or [install](install) respectively.
    pub fn new(file: &str) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(1);
        Config {
            filename: file.to_owned(),
            config: ArcSwap::new(Arc::new((Yaml::Hash(yaml_rust::yaml::Hash::new()), None))),
            tx,
        }
    }

    /// Returns the name of the file this config is loaded from.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Obtains a change notifier which receives a message once the config changed.
    pub fn notifier(&self) -> ChangeNotifier {
        self.tx.subscribe()
    }

    /// Obtains a handle to the currently loaded configuration.
    pub fn current(&self) -> Handle {
        Handle {
            config: self.config.load_full(),
        }
    }

    /// Determines the last modified date of the config file on disk.
    ///
    /// As within docker, the file is presented as volume, we check that it is a file, as an
    /// unmounted docker volume is always presented as directory.
    async fn last_modified(&self) -> Option<SystemTime> {
        tokio::fs::metadata(&self.filename)
            .await
            .ok()
            .filter(|meta| meta.is_file())
            .and_then(|meta| meta.modified().ok())
    }

    /// Forces the config to read the underlying file.
    ///
    /// A missing file (or an unmounted docker volume) is skipped and leaves the current config
    /// untouched.
    ///
    /// # Errors
    /// Fails if the file cannot be read or parsed. In this case the previously loaded config
    /// remains active.
    pub async fn load(&self) -> anyhow::Result<()> {
        log::info!("Loading config file {}...", &self.filename);

        let last_modified = match tokio::fs::metadata(&self.filename).await {
            Ok(metadata) if metadata.is_file() => metadata.modified().ok(),
            _ => {
                log::info!("Config file doesn't exist or is an unmounted docker volume - skipping config load.");
                return Ok(());
            }
        };

        let config_data = tokio::fs::read_to_string(&self.filename)
            .await
            .with_context(|| format!("Cannot load config file {}", &self.filename))?;

        self.load_from_string(config_data.as_str(), last_modified)
    }

    /// Loads a configuration from the given string instead of a file.
    ///
    /// This is intended to be used in test environments where we cannot / do not want to load
    /// a config file from disk.
    ///
    /// # Errors
    /// Fails if the given data isn't valid YAML. In this case the previously loaded config
    /// remains active.
    ///
    /// # Example
    ///
    /// ```
    /// # use lruvault::config::Config;
    /// let config = Config::new("somefile.yml");
    /// config.load_from_string("
    /// caches:
    ///     test:
    ///         size: 128
    /// ", None).unwrap();
    ///
    /// assert_eq!(config.current().query("caches.test.size").as_i64(), Some(128));
    ///
    /// // Loading an invalid config is rejected...
    /// assert_eq!(config.load_from_string("caches: \"test", None).is_err(), true);
    ///
    /// // ...and the previous config remains active.
    /// assert_eq!(config.current().query("caches.test.size").as_i64(), Some(128));
    /// ```
    pub fn load_from_string(
        &self,
        data: &str,
        last_modified: Option<SystemTime>,
    ) -> anyhow::Result<()> {
        let docs = YamlLoader::load_from_str(data)
            .with_context(|| format!("Cannot parse config file {}", &self.filename))?;

        let doc = match docs.into_iter().next() {
            Some(Yaml::Hash(map)) => Yaml::Hash(map),
            _ => Yaml::Hash(yaml_rust::yaml::Hash::new()),
        };

        self.config.store(Arc::new((doc, last_modified)));

        // Notify all listeners - we ignore if there are none...
        let _ = self.tx.send(());

        Ok(())
    }
}

impl Handle {
    /// Provides access to the root of the currently loaded configuration.
    pub fn root(&self) -> &Yaml {
        &self.config.0
    }

    /// Returns the modification date of the file from which this config was loaded.
    pub fn last_modified(&self) -> Option<SystemTime> {
        self.config.1
    }

    /// Resolves a dotted path like **caches.sessions.size** in the loaded configuration.
    ///
    /// Returns **Yaml::BadValue** if any segment of the path is missing.
    pub fn query(&self, query: impl AsRef<str>) -> &Yaml {
        query
            .as_ref()
            .split('.')
            .filter(|key| !key.is_empty())
            .fold(self.root(), |node, key| &node[key])
    }
}

/// Installs a change listener for the given config.
///
/// This spawns a task which checks the "last modified" date of the file every **interval**. Once
/// it is newer than the one of the currently loaded config (or if nothing has been loaded yet),
/// the file is reloaded and all listeners are notified. Note that this will not perform a
/// structural comparison. Therefore it is the duty of each config user to gracefully handle
/// partial config changes.
///
/// The task terminates once the config itself has been dropped. Note that this has to be called
/// from within a tokio runtime.
pub fn install(config: Arc<Config>, interval: Duration) {
    let config = Arc::downgrade(&config);

    crate::spawn!(async move {
        loop {
            tokio::time::sleep(interval).await;

            let config = match config.upgrade() {
                Some(config) => config,
                None => return,
            };

            // This will contain the last modified date of the file on disk or be None if the
            // file is absent...
            let last_modified = config.last_modified().await;

            // Contains the timestamp when the file was loaded the last time or be None if no
            // data has been loaded yet...
            let last_loaded = config.current().last_modified();

            if last_modified.is_some() && (last_loaded.is_none() || last_modified > last_loaded) {
                match config.load().await {
                    Ok(_) => log::info!("System configuration was re-loaded."),
                    Err(error) => log::error!("Failed to re-load system config: {:#}", error),
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use std::sync::Arc;
    use std::time::{Duration, SystemTime};

    #[test]
    fn ensure_config_update_works() {
        crate::testing::test_async(async {
            let config = Config::new("test.yml");

            // Load an initial config...
            config
                .load_from_string("test: 42", Some(SystemTime::now()))
                .unwrap();
            assert_eq!(config.current().query("test").as_i64(), Some(42));

            let mut change_notifier = config.notifier();

            // Ensure that a malformed config is simply ignored...
            assert_eq!(
                config
                    .load_from_string("test: 'invalid", Some(SystemTime::now()))
                    .is_err(),
                true
            );
            assert_eq!(config.current().query("test").as_i64(), Some(42));

            // Change the config...
            config
                .load_from_string("test: 4242", Some(SystemTime::now()))
                .unwrap();

            // ...and ensure that the change has been broadcast...
            assert_eq!(change_notifier.recv().await.is_ok(), true);
            assert_eq!(config.current().query("test").as_i64(), Some(4242));
        });
    }

    #[test]
    fn non_hash_configs_are_treated_as_empty() {
        let config = Config::new("test.yml");
        config.load_from_string("- 1\n- 2", None).unwrap();
        assert_eq!(config.current().query("test").is_badvalue(), true);
        assert_eq!(config.current().root().as_hash().map(|map| map.len()), Some(0));
    }

    #[test]
    fn missing_files_are_skipped() {
        crate::testing::test_async(async {
            let config = Config::new("/this/file/does/not/exist/settings.yml");
            config.load_from_string("test: 42", None).unwrap();

            assert_eq!(config.load().await.is_ok(), true);
            assert_eq!(config.current().query("test").as_i64(), Some(42));
        });
    }

    #[test]
    fn changed_files_are_picked_up() {
        crate::testing::test_async(async {
            let path = std::env::temp_dir().join(format!(
                "lruvault-config-test-{}.yml",
                std::process::id()
            ));
            tokio::fs::write(&path, "caches:\n    test:\n        size: 42\n")
                .await
                .unwrap();

            let config = Arc::new(Config::new(path.to_str().unwrap()));
            let mut change_notifier = config.notifier();
            crate::config::install(config.clone(), Duration::from_millis(10));

            // As nothing has been loaded yet, the monitor will load the file right away...
            let result =
                tokio::time::timeout(Duration::from_secs(5), change_notifier.recv()).await;
            assert_eq!(matches!(result, Ok(Ok(()))), true);
            assert_eq!(
                config.current().query("caches.test.size").as_i64(),
                Some(42)
            );
            let first_load = config.current().last_modified();
            assert_eq!(first_load.is_some(), true);

            // An unchanged file isn't reloaded...
            let result =
                tokio::time::timeout(Duration::from_millis(100), change_notifier.recv()).await;
            assert_eq!(result.is_err(), true);

            // ...but a newer one is. The file is replaced atomically so that the monitor never
            // sees a partially written config.
            let update = path.with_extension("yml.new");
            tokio::fs::write(&update, "caches:\n    test:\n        size: 4242\n")
                .await
                .unwrap();
            std::fs::File::options()
                .write(true)
                .open(&update)
                .unwrap()
                .set_modified(first_load.unwrap() + Duration::from_secs(10))
                .unwrap();
            tokio::fs::rename(&update, &path).await.unwrap();

            let result =
                tokio::time::timeout(Duration::from_secs(5), change_notifier.recv()).await;
            assert_eq!(matches!(result, Ok(Ok(()))), true);
            assert_eq!(
                config.current().query("caches.test.size").as_i64(),
                Some(4242)
            );
            assert_eq!(config.current().last_modified() > first_load, true);

            let _ = tokio::fs::remove_file(&path).await;
        });
    }
}
