//! Turns raw settings into a validated [`ConnectionConfiguration`].
//!
//! Validation is fail-fast: the first violated rule is reported, in the
//! order host, port, database, schema, username, password, realm.

use super::document::keys;
use super::{ConnectionConfiguration, SettingsDocument};
use crate::auth::AuthMode;
use crate::security::SecretString;
use crate::{FemsqError, Result};
use regex::Regex;
use std::sync::OnceLock;

/// Maximum length of a username or password
pub const MAX_CREDENTIAL_LENGTH: usize = 255;
/// Maximum length of a schema name
pub const MAX_SCHEMA_LENGTH: usize = 128;

struct Patterns {
    host: Regex,
    schema: Regex,
    realm: Regex,
}

impl Patterns {
    fn instance() -> &'static Self {
        static PATTERNS: OnceLock<Patterns> = OnceLock::new();
        PATTERNS.get_or_init(Self::compile)
    }

    #[allow(clippy::expect_used)]
    fn compile() -> Self {
        Self {
            host: Regex::new(r"^[A-Za-z0-9\-_.]+$").expect("Invalid host pattern"),
            schema: Regex::new(r"^[A-Za-z0-9_]+$").expect("Invalid schema pattern"),
            realm: Regex::new(r"^[A-Z0-9._\-]+$").expect("Invalid realm pattern"),
        }
    }
}

/// Stateless validator for connection settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigValidator;

impl ConfigValidator {
    /// Creates a validator.
    pub const fn new() -> Self {
        Self
    }

    /// Checks every field rule, stopping at the first violation.
    ///
    /// # Errors
    /// `FemsqError::Validation` naming the offending field.
    pub fn validate(&self, config: &ConnectionConfiguration) -> Result<()> {
        let patterns = Patterns::instance();

        if config.host.trim().is_empty() {
            return Err(FemsqError::validation(keys::HOST, "must not be blank"));
        }
        if !patterns.host.is_match(&config.host) {
            return Err(FemsqError::validation(
                keys::HOST,
                "may only contain letters, digits, '-', '_' and '.'",
            ));
        }

        match config.port {
            None => return Err(FemsqError::validation(keys::PORT, "is required")),
            Some(port) if !(1..=65535).contains(&port) => {
                return Err(FemsqError::validation(keys::PORT, "must be between 1 and 65535"));
            }
            Some(_) => {}
        }

        if config.database.trim().is_empty() {
            return Err(FemsqError::validation(keys::DATABASE, "must not be blank"));
        }

        if let Some(schema) = &config.schema {
            if schema.chars().count() > MAX_SCHEMA_LENGTH {
                return Err(FemsqError::validation(
                    keys::SCHEMA,
                    format!("must be at most {MAX_SCHEMA_LENGTH} characters"),
                ));
            }
            if !patterns.schema.is_match(schema) {
                return Err(FemsqError::validation(
                    keys::SCHEMA,
                    "may only contain letters, digits and '_'",
                ));
            }
        }

        if let Some(username) = &config.username
            && username.chars().count() > MAX_CREDENTIAL_LENGTH
        {
            return Err(FemsqError::validation(
                keys::USERNAME,
                format!("must be at most {MAX_CREDENTIAL_LENGTH} characters"),
            ));
        }

        if let Some(password) = &config.password
            && password.char_len() > MAX_CREDENTIAL_LENGTH
        {
            return Err(FemsqError::validation(
                keys::PASSWORD,
                format!("must be at most {MAX_CREDENTIAL_LENGTH} characters"),
            ));
        }

        if let Some(realm) = &config.realm
            && !patterns.realm.is_match(realm)
        {
            return Err(FemsqError::validation(
                keys::REALM,
                "may only contain uppercase letters, digits, '.', '_' and '-'",
            ));
        }

        Ok(())
    }

    /// Builds a configuration from a settings document and validates it.
    ///
    /// Blank optional values count as absent. An empty password is absent;
    /// other passwords are kept verbatim. A blank `authMode` defaults to
    /// `credentials` when a username is present, else `windows-integrated`.
    ///
    /// # Errors
    /// `FemsqError::Validation` for a non-numeric port or any rule in
    /// [`validate`](Self::validate); `FemsqError::UnsupportedAuthMode` for an
    /// unknown mode.
    pub fn map(&self, document: &SettingsDocument) -> Result<ConnectionConfiguration> {
        let port = document
            .get_non_blank(keys::PORT)
            .map(|raw| {
                raw.trim()
                    .parse::<i32>()
                    .map_err(|_| FemsqError::validation(keys::PORT, "must be numeric"))
            })
            .transpose()?;

        let username = document.get_non_blank(keys::USERNAME).map(str::to_owned);
        let auth_mode = match document.get_non_blank(keys::AUTH_MODE) {
            Some(raw) => raw.parse::<AuthMode>()?,
            None if username.is_some() => AuthMode::Credentials,
            None => AuthMode::WindowsIntegrated,
        };

        let config = ConnectionConfiguration {
            host: document.get(keys::HOST).unwrap_or_default().to_owned(),
            port,
            database: document.get(keys::DATABASE).unwrap_or_default().to_owned(),
            schema: document.get_non_blank(keys::SCHEMA).map(str::to_owned),
            username,
            password: document
                .get(keys::PASSWORD)
                .filter(|password| !password.is_empty())
                .map(SecretString::from),
            auth_mode,
            realm: document.get_non_blank(keys::REALM).map(str::to_owned),
        };

        self.validate(&config)?;
        Ok(config)
    }
}
