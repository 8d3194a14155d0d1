//! Pooled connection providers.
//!
//! [`PoolManager`] owns at most one pool and decides when it has to be
//! rebuilt. The pool itself comes from a [`PoolBackend`]; the SQL Server
//! backend lives in [`mssql`] behind the `mssql` feature.

pub mod manager;
#[cfg(feature = "mssql")]
pub mod mssql;

pub use manager::{PoolManager, PoolState};
#[cfg(feature = "mssql")]
pub use mssql::{MssqlConnection, TiberiusBackend};

use crate::Result;
use crate::auth::ConnectionProperties;
use crate::auth::properties::names;
use async_trait::async_trait;
use std::time::Duration;

/// Scheme of the outbound connection URI
pub const URI_SCHEME: &str = "sqlserver";

/// The (URI, properties) pair that decides whether a pool can be reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSignature {
    /// `sqlserver://host:port;options`
    pub uri: String,
    /// Driver properties derived by the authentication strategy
    pub properties: ConnectionProperties,
}

impl ConnectionSignature {
    /// Pairs `uri` with `properties`.
    pub const fn new(uri: String, properties: ConnectionProperties) -> Self {
        Self { uri, properties }
    }

    /// `host:port/database` without credentials.
    pub fn target(&self) -> String {
        let address = self
            .uri
            .split_once("://")
            .map_or(self.uri.as_str(), |(_, rest)| rest);
        let address = address.split(';').next().unwrap_or_default();
        match self.properties.get(names::DATABASE_NAME) {
            Some(database) => format!("{address}/{database}"),
            None => address.to_owned(),
        }
    }
}

/// Fixed pool tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolPolicy {
    /// Upper bound on open connections
    pub max_size: u32,
    /// Idle connections kept warm
    pub min_idle: u32,
    /// Wait for a connection before failing
    pub connection_timeout: Duration,
    /// Limit on a single validation query
    pub validation_timeout: Duration,
    /// Idle time after which a connection is closed
    pub idle_timeout: Duration,
    /// Age after which a connection is replaced
    pub max_lifetime: Duration,
}

impl PoolPolicy {
    /// Tuning used for every pool built by this crate.
    pub const STANDARD: Self = Self {
        max_size: 10,
        min_idle: 2,
        connection_timeout: Duration::from_secs(10),
        validation_timeout: Duration::from_secs(5),
        idle_timeout: Duration::from_secs(600),
        max_lifetime: Duration::from_secs(1800),
    };
}

impl Default for PoolPolicy {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Builds pools and leases connections from them.
///
/// Implementations wrap a pooling library; [`PoolManager`] only relies on
/// this trait, so it can be driven by a test double.
#[async_trait]
pub trait PoolBackend: Send + Sync + 'static {
    /// Shared pool handle, cheap to clone
    type Pool: Clone + Send + Sync + 'static;
    /// Connection leased from a pool; returned to the pool on drop
    type Connection: Send + 'static;

    /// Builds a pool for `signature`.
    ///
    /// # Errors
    /// `FemsqError::ConnectionOpen` when the pool cannot reach the server.
    async fn build(&self, signature: &ConnectionSignature) -> Result<Self::Pool>;

    /// Leases a connection from `pool`.
    ///
    /// # Errors
    /// `FemsqError::ConnectionOpen` wrapping the driver error.
    async fn lease(&self, pool: &Self::Pool) -> Result<Self::Connection>;

    /// Checks that `connection` is alive.
    ///
    /// # Errors
    /// `FemsqError::ConnectionOpen` when the round trip fails.
    async fn validate(&self, connection: &mut Self::Connection) -> Result<()>;

    /// Shuts `pool` down.
    ///
    /// # Errors
    /// `FemsqError::PoolOperation` when the pool cannot be closed cleanly.
    async fn close(&self, pool: Self::Pool) -> Result<()>;
}
