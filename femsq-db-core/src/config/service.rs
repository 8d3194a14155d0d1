//! Configuration providers: the file-backed cached service and an in-memory
//! double.

use super::{ConfigStore, ConfigValidator, ConnectionConfiguration, SettingsDocument};
use crate::{FemsqError, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::SystemTime;
use tracing::{debug, info};

/// Source of the current connection configuration.
pub trait ConfigurationProvider: Send + Sync {
    /// Returns the current configuration.
    ///
    /// # Errors
    /// `FemsqError::MissingConfiguration` when nothing has been configured;
    /// validation and I/O errors otherwise.
    fn load_config(&self) -> Result<ConnectionConfiguration>;

    /// Replaces the current configuration.
    ///
    /// # Errors
    /// Validation or I/O errors; nothing is changed on failure.
    fn save_config(&self, config: &ConnectionConfiguration) -> Result<()>;

    /// Where the configuration lives, for diagnostics.
    fn location(&self) -> PathBuf;
}

#[derive(Clone)]
struct CachedConfiguration {
    modified: SystemTime,
    config: ConnectionConfiguration,
}

/// File-backed provider caching the mapped configuration by modification time.
///
/// Loads and saves are serialised on the cache lock, so a load that started
/// before a save can never repopulate the cache with the old file.
pub struct ConfigurationService {
    store: ConfigStore,
    validator: ConfigValidator,
    cache: Mutex<Option<CachedConfiguration>>,
}

impl ConfigurationService {
    /// Creates a service reading through `store`.
    pub const fn new(store: ConfigStore) -> Self {
        Self {
            store,
            validator: ConfigValidator::new(),
            cache: Mutex::new(None),
        }
    }

    /// The underlying store.
    pub const fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Drops the cached configuration.
    pub fn invalidate_cache(&self) {
        *self.lock_cache() = None;
    }

    fn lock_cache(&self) -> MutexGuard<'_, Option<CachedConfiguration>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ConfigurationProvider for ConfigurationService {
    fn load_config(&self) -> Result<ConnectionConfiguration> {
        let mut cache = self.lock_cache();
        let path = self.store.resolve_path();
        let Some(modified) = self.store.modified()? else {
            return Err(FemsqError::missing_configuration(&path));
        };

        if let Some(entry) = cache.as_ref().filter(|entry| entry.modified == modified) {
            debug!(path = %path.display(), "Using cached database configuration");
            return Ok(entry.config.clone());
        }

        let document = self.store.load()?;
        if document.is_empty() {
            return Err(FemsqError::missing_configuration(&path));
        }
        let config = self.validator.map(&document)?;

        *cache = Some(CachedConfiguration {
            modified,
            config: config.clone(),
        });
        debug!(path = %path.display(), server = %config.target(), "Loaded database configuration");
        Ok(config)
    }

    fn save_config(&self, config: &ConnectionConfiguration) -> Result<()> {
        self.validator.validate(config)?;
        let mut cache = self.lock_cache();
        self.store.save(&SettingsDocument::from(config))?;
        *cache = None;
        info!(server = %config.target(), "Database configuration updated");
        Ok(())
    }

    fn location(&self) -> PathBuf {
        self.store.resolve_path()
    }
}

/// Loads through `provider` on the blocking thread pool.
pub(crate) async fn load_blocking(provider: &Arc<dyn ConfigurationProvider>) -> Result<ConnectionConfiguration> {
    let provider = Arc::clone(provider);
    tokio::task::spawn_blocking(move || provider.load_config())
        .await
        .map_err(task_failed)?
}

/// Saves through `provider` on the blocking thread pool.
pub(crate) async fn save_blocking(
    provider: &Arc<dyn ConfigurationProvider>,
    config: ConnectionConfiguration,
) -> Result<()> {
    let provider = Arc::clone(provider);
    tokio::task::spawn_blocking(move || provider.save_config(&config))
        .await
        .map_err(task_failed)?
}

fn task_failed(e: tokio::task::JoinError) -> FemsqError {
    FemsqError::configuration(format!("Configuration task failed: {e}"))
}

/// In-memory provider, used for isolated probes and tests.
#[derive(Default)]
pub struct InMemoryConfiguration {
    config: RwLock<Option<ConnectionConfiguration>>,
}

impl InMemoryConfiguration {
    /// Creates a provider with no configuration.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a provider holding `config`.
    pub fn new(config: ConnectionConfiguration) -> Self {
        Self {
            config: RwLock::new(Some(config)),
        }
    }
}

const IN_MEMORY_LOCATION: &str = "<in-memory>";

impl ConfigurationProvider for InMemoryConfiguration {
    fn load_config(&self) -> Result<ConnectionConfiguration> {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| FemsqError::missing_configuration(Path::new(IN_MEMORY_LOCATION)))
    }

    fn save_config(&self, config: &ConnectionConfiguration) -> Result<()> {
        ConfigValidator::new().validate(config)?;
        *self.config.write().unwrap_or_else(PoisonError::into_inner) =
            Some(config.clone());
        Ok(())
    }

    fn location(&self) -> PathBuf {
        PathBuf::from(IN_MEMORY_LOCATION)
    }
}
