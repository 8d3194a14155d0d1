//! Authentication modes and the strategies deriving driver properties from them.
//!
//! # Security
//! Derived properties may carry a password. They live in zeroizing
//! containers and their `Debug` output masks the password.

pub mod properties;
pub mod strategy;

pub use properties::ConnectionProperties;
pub use strategy::{AuthStrategy, AuthStrategyRegistry};

use crate::FemsqError;
use serde::{Deserialize, Serialize};

/// How the connection authenticates against the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    /// SQL Server login with username and password
    #[default]
    Credentials,
    /// Operating-system integrated security (NTLM/SSPI)
    WindowsIntegrated,
    /// Ticket-based integrated security
    Kerberos,
}

impl AuthMode {
    /// All supported modes.
    pub const ALL: [Self; 3] = [Self::Credentials, Self::WindowsIntegrated, Self::Kerberos];

    /// Identifier as stored in the settings file.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Credentials => "credentials",
            Self::WindowsIntegrated => "windows-integrated",
            Self::Kerberos => "kerberos",
        }
    }

    /// True for modes that authenticate without a password.
    pub const fn is_integrated(self) -> bool {
        matches!(self, Self::WindowsIntegrated | Self::Kerberos)
    }
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuthMode {
    type Err = FemsqError;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == normalized)
            .ok_or_else(|| FemsqError::unsupported_auth_mode(s.trim()))
    }
}
