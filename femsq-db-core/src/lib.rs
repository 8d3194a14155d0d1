//! Reconfigurable SQL Server connectivity for FEMSQ.
//!
//! This crate keeps one long-lived connection pool whose settings can be
//! changed at runtime. New settings are validated, tested against the server
//! through a separate pool, persisted to an owner-only settings file and only
//! then swapped in.
//!
//! # Security Guarantees
//! - Passwords are held in zeroizing containers and never logged or displayed
//! - The settings file is written owner-only through an atomic rename
//! - Rejected settings never reach the settings file or the live pool
//!
//! # Architecture
//! - [`config`]: settings document, file store, validator, cached provider
//! - [`auth`]: authentication modes and the strategies deriving driver properties
//! - [`pool`]: pool state machine over a pluggable backend (bb8 + tiberius)
//! - [`connection`]: connection factory and reconnection coordinator

pub mod auth;
pub mod config;
pub mod connection;
pub mod error;
pub mod logging;
pub mod pool;
pub mod security;

// Re-export commonly used types
pub use auth::{AuthMode, AuthStrategy, AuthStrategyRegistry, ConnectionProperties};
pub use config::{
    ConfigStore, ConfigValidator, ConfigurationProvider, ConfigurationService, ConnectionConfiguration,
    InMemoryConfiguration, SettingsDocument,
};
pub use connection::{ConnectionFactory, ConnectionStatus, ReconnectionCoordinator};
pub use error::{FemsqError, Result};
pub use pool::{ConnectionSignature, PoolBackend, PoolManager, PoolPolicy, PoolState};
#[cfg(feature = "mssql")]
pub use pool::{MssqlConnection, TiberiusBackend};
pub use security::SecretString;
