//! Flat key/value settings document stored as a `.properties` file.
//!
//! Reading and writing go through `java-properties`, so comments, line
//! continuations and escapes follow the `java.util.Properties` rules. Files
//! are UTF-8; `\uXXXX` escapes written by other tools are accepted on read.

use super::ConnectionConfiguration;
use crate::security::REDACTED;
use encoding_rs::UTF_8;
use java_properties::{LineEnding, PropertiesError, PropertiesIter, PropertiesWriter};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use zeroize::Zeroizing;

/// Setting keys understood by the validator.
pub mod keys {
    #![allow(missing_docs)]

    pub const HOST: &str = "host";
    pub const PORT: &str = "port";
    pub const DATABASE: &str = "database";
    pub const SCHEMA: &str = "schema";
    pub const USERNAME: &str = "username";
    pub const PASSWORD: &str = "password";
    pub const AUTH_MODE: &str = "authMode";
    pub const REALM: &str = "realm";
}

/// Header comment written at the top of every settings file
pub const HEADER: &str = "FEMSQ database connection settings";

/// On-disk settings as an ordered string map.
///
/// Values are wiped from memory on drop since the map carries the password.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SettingsDocument {
    entries: BTreeMap<String, Zeroizing<String>>,
}

impl SettingsDocument {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|value| value.as_str())
    }

    /// Returns the value for `key`, treating blank values as absent.
    pub fn get_non_blank(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.trim().is_empty())
    }

    /// Sets `key` to `value`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), Zeroizing::new(value.into()));
    }

    /// Removes `key`.
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// True when the document holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Reads a properties document from `reader`.
    ///
    /// # Errors
    /// `InvalidData` for malformed escapes, or the reader's own I/O error.
    pub fn read_from<R: Read>(reader: R) -> std::io::Result<Self> {
        let mut document = Self::new();
        PropertiesIter::new_with_encoding(reader, UTF_8)
            .read_into(|key, value| document.set(key, value))
            .map_err(into_io)?;
        Ok(document)
    }

    /// Parses properties-file text.
    ///
    /// # Errors
    /// As [`read_from`](Self::read_from).
    pub fn parse(text: &str) -> std::io::Result<Self> {
        Self::read_from(text.as_bytes())
    }

    /// Writes the header comment and every entry in key order.
    ///
    /// # Errors
    /// The writer's I/O error.
    pub fn write_to<W: Write>(&self, writer: W) -> std::io::Result<()> {
        let mut properties = PropertiesWriter::new_with_encoding(writer, UTF_8);
        properties.set_line_ending(LineEnding::LF);
        properties.set_comment_prefix("# ").map_err(std::io::Error::other)?;
        properties.set_kv_separator("=").map_err(std::io::Error::other)?;
        properties.write_comment(HEADER).map_err(std::io::Error::other)?;
        for (key, value) in &self.entries {
            properties.write(key, value).map_err(std::io::Error::other)?;
        }
        properties.finish().map_err(std::io::Error::other)
    }
}

fn into_io(e: PropertiesError) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, e)
}

impl From<&ConnectionConfiguration> for SettingsDocument {
    fn from(config: &ConnectionConfiguration) -> Self {
        let mut document = Self::new();
        document.set(keys::HOST, config.host.clone());
        if let Some(port) = config.port {
            document.set(keys::PORT, port.to_string());
        }
        document.set(keys::DATABASE, config.database.clone());
        if let Some(schema) = &config.schema {
            document.set(keys::SCHEMA, schema.clone());
        }
        if let Some(username) = &config.username {
            document.set(keys::USERNAME, username.clone());
        }
        if let Some(password) = &config.password {
            document.set(keys::PASSWORD, password.expose());
        }
        document.set(keys::AUTH_MODE, config.auth_mode.as_str());
        if let Some(realm) = &config.realm {
            document.set(keys::REALM, realm.clone());
        }
        document
    }
}

impl std::fmt::Debug for SettingsDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(key, value)| {
                let shown = if key == keys::PASSWORD {
                    REDACTED
                } else {
                    value.as_str()
                };
                (key.as_str(), shown)
            }))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_handles_comments_separators_and_continuations() {
        let text = "# FEMSQ database connection settings\n\
                    ! another comment\n\
                    \n\
                    host = db.local\n\
                    port:1433\n\
                    database   femsq\n\
                    username=first\\\n    second\r\n";
        let document = SettingsDocument::parse(text).unwrap();

        assert_eq!(document.get("host"), Some("db.local"));
        assert_eq!(document.get("port"), Some("1433"));
        assert_eq!(document.get("database"), Some("femsq"));
        assert_eq!(document.get("username"), Some("firstsecond"));
        assert_eq!(document.len(), 4);
    }

    #[test]
    fn test_awkward_values_survive_write_and_read() {
        let mut document = SettingsDocument::new();
        document.set("password", " p=a:s#s!w\\o\nrd ");
        document.set("schema", "пользователь");
        document.set("realm", "\\uZZZZ");

        let mut text = Vec::new();
        document.write_to(&mut text).unwrap();
        assert!(text.starts_with(b"# FEMSQ database connection settings\n"));
        assert_eq!(SettingsDocument::read_from(text.as_slice()).unwrap(), document);
    }

    #[test]
    fn test_unicode_escape_is_decoded() {
        let document = SettingsDocument::parse("database=\\u0066emsq\n").unwrap();
        assert_eq!(document.get("database"), Some("femsq"));
    }

    #[test]
    fn test_blank_values_are_treated_as_absent() {
        let document = SettingsDocument::parse("schema=\nrealm=   \nhost=x\n").unwrap();
        assert_eq!(document.get("schema"), Some(""));
        assert_eq!(document.get_non_blank("schema"), None);
        assert_eq!(document.get_non_blank("realm"), None);
        assert_eq!(document.get_non_blank("host"), Some("x"));
    }

    #[test]
    fn test_debug_masks_password() {
        let mut document = SettingsDocument::new();
        document.set(keys::PASSWORD, "hunter2");
        let debug = format!("{document:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains(REDACTED));
    }

    #[test]
    fn test_from_configuration_writes_only_present_keys() {
        let config = ConnectionConfiguration::new("db.local", None, "femsq");
        let document = SettingsDocument::from(&config);

        assert_eq!(document.get(keys::HOST), Some("db.local"));
        assert_eq!(document.get(keys::AUTH_MODE), Some("credentials"));
        assert_eq!(document.get(keys::PORT), None);
        assert_eq!(document.get(keys::PASSWORD), None);
    }
}
