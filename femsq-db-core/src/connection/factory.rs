//! Connection factory: configuration, authentication and pooling composed
//! behind `create_connection` and `test_connection`.

use crate::auth::properties::names;
use crate::auth::{AuthStrategy, AuthStrategyRegistry};
use crate::config::service::load_blocking;
use crate::config::{ConfigurationProvider, ConnectionConfiguration, InMemoryConfiguration};
use crate::pool::{ConnectionSignature, PoolBackend, PoolManager, PoolState, URI_SCHEME};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Formats the outbound connection URI for `config`.
///
/// Only host and port take part; the port defaults to 1433.
///
/// # Example
/// ```rust
/// use femsq_db_core::config::ConnectionConfiguration;
/// use femsq_db_core::connection::build_uri;
///
/// let config = ConnectionConfiguration::new("db.local", None, "femsq");
/// assert_eq!(
///     build_uri(&config),
///     "sqlserver://db.local:1433;encrypt=false;trustServerCertificate=true"
/// );
/// ```
pub fn build_uri(config: &ConnectionConfiguration) -> String {
    format!(
        "{URI_SCHEME}://{}:{};encrypt=false;trustServerCertificate=true",
        config.host,
        config.effective_port()
    )
}

/// Builds the pool signature for `config` authenticated by `strategy`.
///
/// # Errors
/// Whatever the strategy raises, typically `FemsqError::MissingCredential`.
pub fn signature_for(config: &ConnectionConfiguration, strategy: AuthStrategy) -> Result<ConnectionSignature> {
    let mut properties = strategy.derive_properties(config)?;
    properties.set_if_absent(names::DATABASE_NAME, config.database.clone());
    Ok(ConnectionSignature::new(build_uri(config), properties))
}

/// Hands out connections for the configured database.
///
/// The live pool serves the configured settings. A second, separate pool
/// serves caller-supplied settings so probing them never disturbs the live one.
pub struct ConnectionFactory<B: PoolBackend> {
    backend: Arc<B>,
    provider: Arc<dyn ConfigurationProvider>,
    registry: AuthStrategyRegistry,
    live: PoolManager<B>,
    probe: PoolManager<B>,
}

impl<B: PoolBackend> ConnectionFactory<B> {
    /// Creates a factory reading its settings from `provider`.
    pub fn new(backend: Arc<B>, provider: Arc<dyn ConfigurationProvider>) -> Self {
        Self {
            live: PoolManager::new(Arc::clone(&backend), "live"),
            probe: PoolManager::new(Arc::clone(&backend), "probe"),
            backend,
            provider,
            registry: AuthStrategyRegistry::new(),
        }
    }

    /// Creates a separate factory bound to `candidate`, sharing only the backend.
    pub fn isolated(&self, candidate: ConnectionConfiguration) -> Self {
        Self::new(
            Arc::clone(&self.backend),
            Arc::new(InMemoryConfiguration::new(candidate)),
        )
    }

    /// The configuration provider this factory reads from.
    pub fn provider(&self) -> Arc<dyn ConfigurationProvider> {
        Arc::clone(&self.provider)
    }

    /// Leases a connection for the current configuration.
    ///
    /// # Errors
    /// Configuration errors (`MissingConfiguration`, `Validation`,
    /// `ConfigIo`, `UnsupportedAuthMode`) pass through unchanged, as do
    /// `MissingCredential`, `ConnectionOpen` and `PoolOperation`.
    pub async fn create_connection(&self) -> Result<B::Connection> {
        let config = load_blocking(&self.provider).await?;
        let strategy = self.registry.strategy_for(config.auth_mode);
        let signature = signature_for(&config, strategy)?;
        self.live.connect(&signature).await
    }

    /// Leases a connection for caller-supplied settings from the probe pool.
    ///
    /// # Errors
    /// As [`create_connection`](Self::create_connection).
    pub async fn create_connection_with(
        &self,
        config: &ConnectionConfiguration,
        strategy: AuthStrategy,
    ) -> Result<B::Connection> {
        let signature = signature_for(config, strategy)?;
        self.probe.connect(&signature).await
    }

    /// Opens and validates a connection for the current configuration
    /// authenticated with `strategy`. Never fails; problems yield `false`.
    ///
    /// The configured strategy goes through the live pool, any other
    /// strategy through the probe pool, which is released afterwards.
    pub async fn test_connection(&self, strategy: AuthStrategy, timeout_secs: u64) -> bool {
        let outcome = tokio::time::timeout(probe_timeout(timeout_secs), self.probe_once(strategy)).await;
        self.probe.invalidate().await;

        match outcome {
            Ok(Ok(())) => {
                debug!(strategy = strategy.name(), "Connection test succeeded");
                true
            }
            Ok(Err(e)) => {
                warn!(strategy = strategy.name(), error = %e, "Connection test failed");
                false
            }
            Err(_) => {
                warn!(strategy = strategy.name(), timeout_secs, "Connection test timed out");
                false
            }
        }
    }

    async fn probe_once(&self, strategy: AuthStrategy) -> Result<()> {
        let config = load_blocking(&self.provider).await?;
        let mut connection = if strategy.mode() == config.auth_mode {
            self.create_connection().await?
        } else {
            self.create_connection_with(&config, strategy).await?
        };
        self.backend.validate(&mut connection).await
    }

    /// Discards the live pool; the next connection rebuilds it.
    pub async fn reload_pool(&self) {
        self.live.invalidate().await;
        info!("Connection pool reload requested");
    }

    /// Closes both pools. Further connections fail.
    pub async fn close(&self) {
        self.live.close().await;
        self.probe.close().await;
    }

    /// State of the live pool.
    pub async fn pool_state(&self) -> PoolState {
        self.live.state().await
    }

    /// State of the probe pool.
    pub async fn probe_state(&self) -> PoolState {
        self.probe.state().await
    }

    /// Signature the live pool currently serves.
    pub async fn live_signature(&self) -> Option<ConnectionSignature> {
        self.live.active_signature().await
    }
}

fn probe_timeout(timeout_secs: u64) -> Duration {
    Duration::from_secs(timeout_secs.max(1))
}

impl<B: PoolBackend> std::fmt::Debug for ConnectionFactory<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionFactory")
            .field("location", &self.provider.location())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FemsqError;
    use crate::auth::AuthMode;

    #[test]
    fn test_build_uri_with_port() {
        let config = ConnectionConfiguration::new("db.local", Some(1433), "femsq");
        assert_eq!(
            build_uri(&config),
            "sqlserver://db.local:1433;encrypt=false;trustServerCertificate=true"
        );
    }

    #[test]
    fn test_build_uri_defaults_port() {
        let with_port = ConnectionConfiguration::new("db.local", Some(1433), "femsq");
        let without_port = ConnectionConfiguration::new("db.local", None, "other")
            .with_credentials("sa", "secret")
            .with_schema("ags");
        assert_eq!(build_uri(&without_port), build_uri(&with_port));
    }

    #[test]
    fn test_signature_adds_database_name() {
        let config = ConnectionConfiguration::new("db.local", Some(1433), "femsq")
            .with_auth_mode(AuthMode::WindowsIntegrated);
        let signature = signature_for(&config, AuthStrategy::WindowsIntegrated).unwrap();

        assert_eq!(signature.properties.get(names::DATABASE_NAME), Some("femsq"));
        assert!(signature.properties.integrated_security());
    }

    #[test]
    fn test_signature_surfaces_missing_username() {
        let config = ConnectionConfiguration::new("db.local", Some(1433), "femsq");
        let error = signature_for(&config, AuthStrategy::Credentials).unwrap_err();
        assert!(matches!(error, FemsqError::MissingCredential { .. }));
    }

    #[test]
    fn test_probe_timeout_is_at_least_one_second() {
        assert_eq!(probe_timeout(0), Duration::from_secs(1));
        assert_eq!(probe_timeout(5), Duration::from_secs(5));
    }
}
