//! Error types for configuration, validation, authentication and pooling.
//!
//! Every error in this module is safe to surface to an administrator: messages
//! carry the offending field, path or target host, but never a password or a
//! connection property value that could contain one.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for FEMSQ database connectivity.
///
/// # Security
/// Passwords are never part of an error message. Connection targets are
/// rendered as `host:port/database` without credentials.
#[derive(Debug, Error)]
pub enum FemsqError {
    /// Reading or writing the settings file failed
    #[error("Configuration file operation failed: {context} ({})", path.display())]
    ConfigIo {
        /// Operation that failed
        context: String,
        /// Settings file or directory
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// No settings file has been written yet (or it is empty)
    #[error("Database configuration file not found: {}", path.display())]
    MissingConfiguration {
        /// Expected settings file
        path: PathBuf,
    },

    /// User-supplied configuration value is malformed
    #[error("Invalid configuration: {field} {reason}")]
    Validation {
        /// Settings key that failed
        field: String,
        /// Why it failed
        reason: String,
    },

    /// Authentication mode identifier is not one of the supported modes
    #[error("Unsupported authentication mode: {mode}")]
    UnsupportedAuthMode {
        /// Identifier as supplied
        mode: String,
    },

    /// A strategy needs a credential the configuration does not provide
    #[error("{strategy} authentication requires {field}")]
    MissingCredential {
        /// Missing settings key
        field: String,
        /// Strategy that needs it
        strategy: String,
    },

    /// The driver could not open or validate a connection
    #[error("Database connection failed: {context}")]
    ConnectionOpen {
        /// What was being opened
        context: String,
        /// Driver error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A candidate configuration did not pass its live connection test
    #[error("Connection test failed for {target}")]
    ConnectionTest {
        /// `host:port/database` of the candidate
        target: String,
    },

    /// Building, closing or using a connection pool failed
    #[error("Connection pool operation failed: {context}")]
    PoolOperation {
        /// What went wrong
        context: String,
    },

    /// Ambient setup error (logging, CLI input)
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the problem
        message: String,
    },
}

/// Convenience type alias for Results with `FemsqError`
pub type Result<T> = std::result::Result<T, FemsqError>;

impl FemsqError {
    /// Creates a settings-file I/O error for `path`
    pub fn config_io(context: impl Into<String>, path: &Path, source: std::io::Error) -> Self {
        Self::ConfigIo {
            context: context.into(),
            path: path.to_path_buf(),
            source,
        }
    }

    /// Creates a missing-configuration error for `path`
    pub fn missing_configuration(path: &Path) -> Self {
        Self::MissingConfiguration {
            path: path.to_path_buf(),
        }
    }

    /// Creates a validation error naming the offending field
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an unsupported authentication mode error
    pub fn unsupported_auth_mode(mode: impl Into<String>) -> Self {
        Self::UnsupportedAuthMode { mode: mode.into() }
    }

    /// Creates a missing credential error
    pub fn missing_credential(field: impl Into<String>, strategy: impl Into<String>) -> Self {
        Self::MissingCredential {
            field: field.into(),
            strategy: strategy.into(),
        }
    }

    /// Creates a connection error wrapping the driver error
    pub fn connection_failed<E>(context: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ConnectionOpen {
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates a failed connection test error for a credential-free target
    pub fn connection_test_failed(target: impl Into<String>) -> Self {
        Self::ConnectionTest {
            target: target.into(),
        }
    }

    /// Creates a pool operation error
    pub fn pool_operation(context: impl Into<String>) -> Self {
        Self::PoolOperation {
            context: context.into(),
        }
    }

    /// Creates an ambient configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns the field name carried by a validation error.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } | Self::MissingCredential { field, .. } => Some(field),
            _ => None,
        }
    }

    /// True when the error means "nothing has been configured yet".
    pub const fn is_missing_configuration(&self) -> bool {
        matches!(self, Self::MissingConfiguration { .. })
    }
}
