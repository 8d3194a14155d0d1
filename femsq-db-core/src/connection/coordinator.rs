//! Hot reload of connection settings.
//!
//! `reconnect` runs validate, test, persist and invalidate in that order. A
//! failure at any step leaves the persisted settings and the live pool as
//! they were.

use super::factory::{ConnectionFactory, signature_for};
use crate::auth::{AuthStrategy, AuthStrategyRegistry};
use crate::config::service::{load_blocking, save_blocking};
use crate::config::{ConfigValidator, ConfigurationProvider, ConnectionConfiguration};
use crate::pool::PoolBackend;
use crate::{FemsqError, Result};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Timeout for test-before-commit probes, in seconds
pub const DEFAULT_TEST_TIMEOUT_SECS: u64 = 5;

/// Connection report for administrative surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    /// True when a validated connection was obtained
    pub connected: bool,
    /// Configured default schema
    pub schema: Option<String>,
    /// Configured database
    pub database: Option<String>,
    /// Human-readable summary
    pub message: String,
    /// Error text when the configuration could not be read
    pub error: Option<String>,
}

impl ConnectionStatus {
    fn probed(config: &ConnectionConfiguration, connected: bool) -> Self {
        Self {
            connected,
            schema: config.schema.clone(),
            database: Some(config.database.clone()),
            message: if connected {
                format!("connected to {}", config.target())
            } else {
                format!("connection to {} failed", config.target())
            },
            error: None,
        }
    }

    fn unavailable(message: &str, error: Option<&FemsqError>) -> Self {
        Self {
            connected: false,
            schema: None,
            database: None,
            message: message.to_owned(),
            error: error.map(ToString::to_string),
        }
    }
}

/// Applies new connection settings without restarting.
pub struct ReconnectionCoordinator<B: PoolBackend> {
    factory: Arc<ConnectionFactory<B>>,
    provider: Arc<dyn ConfigurationProvider>,
    validator: ConfigValidator,
    registry: AuthStrategyRegistry,
    commit_lock: Mutex<()>,
    test_timeout_secs: u64,
}

impl<B: PoolBackend> ReconnectionCoordinator<B> {
    /// Creates a coordinator persisting through `provider` and reloading `factory`.
    ///
    /// `provider` should be the one `factory` reads from, otherwise a reload
    /// does not pick up the saved settings.
    pub fn new(factory: Arc<ConnectionFactory<B>>, provider: Arc<dyn ConfigurationProvider>) -> Self {
        Self {
            factory,
            provider,
            validator: ConfigValidator::new(),
            registry: AuthStrategyRegistry::new(),
            commit_lock: Mutex::new(()),
            test_timeout_secs: DEFAULT_TEST_TIMEOUT_SECS,
        }
    }

    /// Creates a coordinator using the factory's own provider.
    pub fn for_factory(factory: Arc<ConnectionFactory<B>>) -> Self {
        let provider = factory.provider();
        Self::new(factory, provider)
    }

    /// Overrides the probe timeout.
    #[must_use]
    pub fn with_test_timeout(mut self, secs: u64) -> Self {
        self.test_timeout_secs = secs;
        self
    }

    /// The factory being reloaded.
    pub fn factory(&self) -> &Arc<ConnectionFactory<B>> {
        &self.factory
    }

    /// Validates, tests, persists and activates `candidate`.
    ///
    /// Once this returns `Ok`, every new connection uses `candidate`.
    ///
    /// # Errors
    /// - `Validation`, `UnsupportedAuthMode`, `MissingCredential` before any probe
    /// - `ConnectionTest` when the candidate cannot connect
    /// - `ConfigIo` when persisting fails; the live pool is then left untouched
    pub async fn reconnect(&self, candidate: ConnectionConfiguration) -> Result<()> {
        let strategy = self.prepare(&candidate)?;

        if !self.probe(&candidate, strategy).await {
            warn!(server = %candidate.target(), "Rejected connection settings: test failed");
            return Err(FemsqError::connection_test_failed(candidate.target()));
        }

        let target = candidate.target();
        let auth_mode = candidate.auth_mode;
        let _commit = self.commit_lock.lock().await;
        save_blocking(&self.provider, candidate).await?;
        self.factory.reload_pool().await;
        info!(server = %target, auth_mode = %auth_mode, "✓ Connection settings applied");
        Ok(())
    }

    /// Validates and tests `candidate` without persisting it.
    ///
    /// # Errors
    /// `Validation`, `UnsupportedAuthMode` or `MissingCredential`. A failed
    /// connection is reported in the status, not as an error.
    pub async fn test_candidate(&self, candidate: &ConnectionConfiguration) -> Result<ConnectionStatus> {
        let strategy = self.prepare(candidate)?;
        let connected = self.probe(candidate, strategy).await;
        Ok(ConnectionStatus::probed(candidate, connected))
    }

    /// The persisted configuration.
    ///
    /// # Errors
    /// As [`ConfigurationProvider::load_config`].
    pub async fn current_config(&self) -> Result<ConnectionConfiguration> {
        load_blocking(&self.provider).await
    }

    /// True when the live configuration can serve a validated connection.
    pub async fn is_connected(&self) -> bool {
        match load_blocking(&self.provider).await {
            Ok(config) => {
                let strategy = self.registry.strategy_for(config.auth_mode);
                self.factory.test_connection(strategy, self.test_timeout_secs).await
            }
            Err(e) => {
                warn!(error = %e, "Cannot check connection without a configuration");
                false
            }
        }
    }

    /// Status of the live configuration. Never fails.
    pub async fn status(&self) -> ConnectionStatus {
        match load_blocking(&self.provider).await {
            Ok(config) => {
                let strategy = self.registry.strategy_for(config.auth_mode);
                let connected = self.factory.test_connection(strategy, self.test_timeout_secs).await;
                ConnectionStatus::probed(&config, connected)
            }
            Err(e) if e.is_missing_configuration() => ConnectionStatus::unavailable("configuration not found", None),
            Err(e) => ConnectionStatus::unavailable("configuration invalid", Some(&e)),
        }
    }

    fn prepare(&self, candidate: &ConnectionConfiguration) -> Result<AuthStrategy> {
        self.validator.validate(candidate)?;
        let strategy = self.registry.strategy_for(candidate.auth_mode);
        signature_for(candidate, strategy)?;
        Ok(strategy)
    }

    async fn probe(&self, candidate: &ConnectionConfiguration, strategy: AuthStrategy) -> bool {
        let isolated = self.factory.isolated(candidate.clone());
        let connected = isolated.test_connection(strategy, self.test_timeout_secs).await;
        isolated.close().await;
        connected
    }
}
