//! Zeroizing string for passwords.
//!
//! # Security
//! - The contents are cleared from memory when the value is dropped
//! - `Debug` prints a fixed placeholder, never the contents
//! - Access to the contents requires an explicit `expose()` call

use super::REDACTED;
use zeroize::Zeroizing;

/// A password or other secret string.
///
/// # Example
///
/// ```rust
/// use femsq_db_core::security::SecretString;
///
/// let secret = SecretString::from("hunter2");
/// assert_eq!(secret.expose(), "hunter2");
/// assert_eq!(format!("{secret:?}"), "SecretString(***)");
/// ```
#[derive(Clone, PartialEq, Eq, Default)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
    /// Wraps `value` in a zeroizing container.
    pub fn new(value: String) -> Self {
        Self(Zeroizing::new(value))
    }

    /// Returns the secret contents.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// True when the secret is the empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length in characters, used for bound checks without exposing contents.
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value.to_owned())
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretString({REDACTED})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_never_shows_contents() {
        let secret = SecretString::from("s3cr3t-value");
        let debug = format!("{secret:?}");
        assert!(!debug.contains("s3cr3t"));
        assert!(debug.contains(REDACTED));
    }

    #[test]
    fn test_expose_and_len() {
        let secret = SecretString::from("пароль".to_string());
        assert_eq!(secret.expose(), "пароль");
        assert_eq!(secret.char_len(), 6);
        assert!(!secret.is_empty());
        assert!(SecretString::default().is_empty());
    }
}
