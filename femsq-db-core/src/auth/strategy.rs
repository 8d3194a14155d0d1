//! Authentication strategies and their registry.

use super::properties::{ConnectionProperties, names};
use super::AuthMode;
use crate::config::ConnectionConfiguration;
use crate::{FemsqError, Result};

/// Scheme identifier for ticket-based authentication
pub const KERBEROS_SCHEME: &str = "Kerberos";

/// Derives driver properties for one authentication mode.
///
/// Strategies are stateless; deriving properties has no side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthStrategy {
    /// Username and optional password
    Credentials,
    /// Operating-system integrated security
    WindowsIntegrated,
    /// Integrated security with the `Kerberos` scheme and optional realm
    Kerberos,
}

impl AuthStrategy {
    /// The mode this strategy serves.
    pub const fn mode(self) -> AuthMode {
        match self {
            Self::Credentials => AuthMode::Credentials,
            Self::WindowsIntegrated => AuthMode::WindowsIntegrated,
            Self::Kerberos => AuthMode::Kerberos,
        }
    }

    /// Mode identifier, as stored in the settings file.
    pub const fn name(self) -> &'static str {
        self.mode().as_str()
    }

    /// Builds the authentication properties for `config`.
    ///
    /// # Errors
    /// `FemsqError::MissingCredential` when the credentials strategy gets a
    /// configuration without a username.
    pub fn derive_properties(self, config: &ConnectionConfiguration) -> Result<ConnectionProperties> {
        let mut properties = ConnectionProperties::new();
        match self {
            Self::Credentials => {
                let username = config
                    .username
                    .as_deref()
                    .filter(|username| !username.trim().is_empty())
                    .ok_or_else(|| FemsqError::missing_credential("username", self.name()))?;
                properties.set(names::USER, username);
                if let Some(password) = &config.password {
                    properties.set(names::PASSWORD, password.expose());
                }
            }
            Self::WindowsIntegrated => {
                properties.set(names::INTEGRATED_SECURITY, "true");
            }
            Self::Kerberos => {
                properties.set(names::INTEGRATED_SECURITY, "true");
                properties.set(names::AUTHENTICATION_SCHEME, KERBEROS_SCHEME);
                if let Some(realm) = config.realm.as_deref().filter(|realm| !realm.trim().is_empty()) {
                    properties.set(names::REALM, realm);
                }
            }
        }
        Ok(properties)
    }
}

impl From<AuthMode> for AuthStrategy {
    fn from(mode: AuthMode) -> Self {
        match mode {
            AuthMode::Credentials => Self::Credentials,
            AuthMode::WindowsIntegrated => Self::WindowsIntegrated,
            AuthMode::Kerberos => Self::Kerberos,
        }
    }
}

/// Maps mode identifiers to strategies.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthStrategyRegistry;

impl AuthStrategyRegistry {
    /// Creates the registry of built-in strategies.
    pub const fn new() -> Self {
        Self
    }

    /// Looks up the strategy for a mode identifier.
    ///
    /// # Errors
    /// `FemsqError::UnsupportedAuthMode` for an unknown identifier.
    pub fn resolve(&self, mode: &str) -> Result<AuthStrategy> {
        mode.parse::<AuthMode>().map(AuthStrategy::from)
    }

    /// Strategy for an already-parsed mode.
    pub fn strategy_for(&self, mode: AuthMode) -> AuthStrategy {
        AuthStrategy::from(mode)
    }

    /// Identifiers of every registered strategy.
    pub fn available(&self) -> impl Iterator<Item = &'static str> {
        AuthMode::ALL.into_iter().map(AuthMode::as_str)
    }
}
