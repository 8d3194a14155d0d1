//! Connection configuration: the typed value, its on-disk document, the
//! file store, the validator and the cached loader.
//!
//! # Security
//! `ConnectionConfiguration` keeps its password in a [`SecretString`]; neither
//! `Debug` nor `Display` render it.

pub mod document;
pub mod service;
pub mod store;
pub mod validator;

pub use document::SettingsDocument;
pub use service::{ConfigurationProvider, ConfigurationService, InMemoryConfiguration};
pub use store::ConfigStore;
pub use validator::ConfigValidator;

use crate::auth::AuthMode;
use crate::security::{REDACTED, SecretString};

/// Default SQL Server port used when the configuration omits one
pub const DEFAULT_PORT: u16 = 1433;

/// Validated connection settings.
///
/// Values are plain data; use [`ConfigValidator::validate`] before handing a
/// hand-built value to network code.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfiguration {
    /// Server host name or address
    pub host: String,
    /// Kept signed so that out-of-range input survives until validation
    pub port: Option<i32>,
    /// Initial database
    pub database: String,
    /// Default schema for application queries
    pub schema: Option<String>,
    /// Login name, required by credentials authentication
    pub username: Option<String>,
    /// Login password
    pub password: Option<SecretString>,
    /// Authentication mode
    pub auth_mode: AuthMode,
    /// Kerberos realm
    pub realm: Option<String>,
}

impl ConnectionConfiguration {
    /// Creates a configuration for `host`/`database` with credentials auth.
    pub fn new(host: impl Into<String>, port: Option<i32>, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            schema: None,
            username: None,
            password: None,
            auth_mode: AuthMode::Credentials,
            realm: None,
        }
    }

    /// Sets the username and password.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<SecretString>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets the authentication mode.
    pub fn with_auth_mode(mut self, auth_mode: AuthMode) -> Self {
        self.auth_mode = auth_mode;
        self
    }

    /// Sets the default schema.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Sets the Kerberos realm.
    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    /// Port to dial, substituting [`DEFAULT_PORT`] when absent.
    pub fn effective_port(&self) -> i32 {
        self.port.unwrap_or(i32::from(DEFAULT_PORT))
    }

    /// Credential-free `host:port/database` description for logs and errors.
    pub fn target(&self) -> String {
        format!("{}:{}/{}", self.host, self.effective_port(), self.database)
    }

    /// True when a password is set.
    pub const fn has_password(&self) -> bool {
        self.password.is_some()
    }
}

impl std::fmt::Display for ConnectionConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.target(), self.auth_mode)?;
        if let Some(username) = &self.username {
            write!(f, " as {username}")?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ConnectionConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfiguration")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .field("auth_mode", &self.auth_mode)
            .field("realm", &self.realm)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_debug_hide_password() {
        let config = ConnectionConfiguration::new("db.local", Some(1433), "femsq")
            .with_credentials("sa", "TopSecret!");

        let display = config.to_string();
        let debug = format!("{config:?}");
        assert_eq!(display, "db.local:1433/femsq (credentials) as sa");
        assert!(!display.contains("TopSecret"));
        assert!(!debug.contains("TopSecret"));
        assert!(debug.contains(REDACTED));
    }

    #[test]
    fn test_effective_port_defaults() {
        let config = ConnectionConfiguration::new("db.local", None, "femsq");
        assert_eq!(config.effective_port(), 1433);
        assert_eq!(config.target(), "db.local:1433/femsq");
    }
}
