//! Driver-level connection properties produced by an authentication strategy.

use crate::security::REDACTED;
use std::collections::BTreeMap;
use zeroize::Zeroizing;

/// Well-known property names.
pub mod names {
    /// Login name
    pub const USER: &str = "user";
    /// Login password
    pub const PASSWORD: &str = "password";
    /// `true` when the operating system supplies the identity
    pub const INTEGRATED_SECURITY: &str = "integratedSecurity";
    /// Integrated-security mechanism, e.g. `Kerberos`
    pub const AUTHENTICATION_SCHEME: &str = "authenticationScheme";
    /// Kerberos realm
    pub const REALM: &str = "realm";
    /// Initial database
    pub const DATABASE_NAME: &str = "databaseName";
}

/// Ordered property set. Values are wiped from memory on drop.
///
/// Two property sets are equal when they hold the same keys and values, which
/// makes them usable as part of a pool signature.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectionProperties {
    values: BTreeMap<String, Zeroizing<String>>,
}

impl ConnectionProperties {
    /// Creates an empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name`, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), Zeroizing::new(value.into()));
    }

    /// Sets `name` unless it already has a value.
    pub fn set_if_absent(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values
            .entry(name.into())
            .or_insert_with(|| Zeroizing::new(value.into()));
    }

    /// Value of `name`, if set.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|value| value.as_str())
    }

    /// True when `name` is set.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no property is set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when `integratedSecurity` is set to `true`.
    pub fn integrated_security(&self) -> bool {
        self.get(names::INTEGRATED_SECURITY)
            .is_some_and(|value| value.eq_ignore_ascii_case("true"))
    }

    /// Property pairs with the password replaced by a placeholder.
    pub fn redacted(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(name, value)| {
            let shown = if name == names::PASSWORD {
                REDACTED
            } else {
                value.as_str()
            };
            (name.as_str(), shown)
        })
    }
}

impl std::fmt::Debug for ConnectionProperties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.redacted()).finish()
    }
}

impl std::fmt::Display for ConnectionProperties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, (name, value)) in self.redacted().enumerate() {
            if index > 0 {
                f.write_str(";")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}
