//! SQL Server pool backend built on bb8 and tiberius.
//!
//! The connection URI has the form
//! `sqlserver://host:port;encrypt=false;trustServerCertificate=true`; the
//! authentication and database come from the signature's properties.

use super::{ConnectionSignature, PoolBackend, PoolPolicy, URI_SCHEME};
use crate::auth::properties::names;
use crate::config::DEFAULT_PORT;
use crate::{FemsqError, Result};
use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use bb8_tiberius::ConnectionManager;
use tiberius::{AuthMethod, Config, EncryptionLevel};
use tracing::debug;

/// Application name reported to the server
pub const APPLICATION_NAME: &str = "femsq";

/// Connection leased from a tiberius pool
pub type MssqlConnection = PooledConnection<'static, ConnectionManager>;

/// bb8 pool of tiberius clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct TiberiusBackend {
    policy: PoolPolicy,
}

impl TiberiusBackend {
    /// Creates a backend using [`PoolPolicy::STANDARD`].
    pub const fn new() -> Self {
        Self {
            policy: PoolPolicy::STANDARD,
        }
    }

    /// Tuning applied to built pools.
    pub const fn policy(&self) -> &PoolPolicy {
        &self.policy
    }
}

/// Translates a signature into a tiberius client configuration.
///
/// # Errors
/// `FemsqError::PoolOperation` for a malformed URI;
/// `FemsqError::ConnectionOpen` when integrated security is requested on a
/// build without integrated authentication support.
pub fn client_config(signature: &ConnectionSignature) -> Result<Config> {
    let malformed = || FemsqError::pool_operation(format!("malformed connection URI for {}", signature.target()));

    let rest = signature
        .uri
        .strip_prefix(URI_SCHEME)
        .and_then(|rest| rest.strip_prefix("://"))
        .ok_or_else(malformed)?;
    let mut segments = rest.split(';');
    let address = segments.next().unwrap_or_default();
    let (host, port) = match address.rsplit_once(':') {
        Some((host, port)) => (host, port.parse::<u16>().map_err(|_| malformed())?),
        None => (address, DEFAULT_PORT),
    };
    if host.is_empty() {
        return Err(malformed());
    }

    let mut config = Config::new();
    config.host(host);
    config.port(port);
    config.application_name(APPLICATION_NAME);
    config.encryption(EncryptionLevel::Required);

    for option in segments.filter(|segment| !segment.is_empty()) {
        let (key, value) = option.split_once('=').ok_or_else(malformed)?;
        let enabled = value.eq_ignore_ascii_case("true");
        match key.to_ascii_lowercase().as_str() {
            "encrypt" if !enabled => config.encryption(EncryptionLevel::Off),
            "encrypt" => config.encryption(EncryptionLevel::Required),
            "trustservercertificate" if enabled => config.trust_cert(),
            other => debug!(option = other, "Ignoring connection URI option"),
        }
    }

    let properties = &signature.properties;
    if let Some(database) = properties.get(names::DATABASE_NAME) {
        config.database(database);
    }

    if properties.integrated_security() {
        if let Some(realm) = properties.get(names::REALM) {
            debug!(realm, "Realm is resolved by the system Kerberos configuration");
        }
        config.authentication(integrated_auth(signature)?);
    } else {
        let user = properties.get(names::USER).unwrap_or_default();
        let password = properties.get(names::PASSWORD).unwrap_or_default();
        config.authentication(AuthMethod::sql_server(user, password));
    }

    Ok(config)
}

#[cfg(any(windows, feature = "integrated-auth-gssapi"))]
#[allow(clippy::unnecessary_wraps)]
fn integrated_auth(_signature: &ConnectionSignature) -> Result<AuthMethod> {
    Ok(AuthMethod::Integrated)
}

#[cfg(not(any(windows, feature = "integrated-auth-gssapi")))]
fn integrated_auth(signature: &ConnectionSignature) -> Result<AuthMethod> {
    Err(FemsqError::connection_failed(
        format!("integrated authentication for {}", signature.target()),
        std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "built without integrated authentication support (enable feature `integrated-auth-gssapi`)",
        ),
    ))
}

#[async_trait]
impl PoolBackend for TiberiusBackend {
    type Pool = Pool<ConnectionManager>;
    type Connection = MssqlConnection;

    async fn build(&self, signature: &ConnectionSignature) -> Result<Self::Pool> {
        let manager = ConnectionManager::new(client_config(signature)?);

        Pool::builder()
            .max_size(self.policy.max_size)
            .min_idle(Some(self.policy.min_idle))
            .connection_timeout(self.policy.connection_timeout)
            .idle_timeout(Some(self.policy.idle_timeout))
            .max_lifetime(Some(self.policy.max_lifetime))
            .test_on_check_out(true)
            .build(manager)
            .await
            .map_err(|e| {
                FemsqError::connection_failed(format!("failed to create pool for {}", signature.target()), e)
            })
    }

    async fn lease(&self, pool: &Self::Pool) -> Result<Self::Connection> {
        pool.get_owned()
            .await
            .map_err(|e| FemsqError::connection_failed("failed to lease connection", e))
    }

    async fn validate(&self, connection: &mut Self::Connection) -> Result<()> {
        let probe = async {
            connection.simple_query("SELECT 1").await?.into_row().await?;
            Ok::<_, tiberius::error::Error>(())
        };

        tokio::time::timeout(self.policy.validation_timeout, probe)
            .await
            .map_err(|e| FemsqError::connection_failed("connection validation timed out", e))?
            .map_err(|e| FemsqError::connection_failed("connection validation failed", e))
    }

    async fn close(&self, pool: Self::Pool) -> Result<()> {
        // bb8 closes idle connections once the last handle is dropped; leased
        // connections close when returned.
        let state = pool.state();
        debug!(
            connections = state.connections,
            idle = state.idle_connections,
            "Dropping connection pool"
        );
        drop(pool);
        Ok(())
    }
}
