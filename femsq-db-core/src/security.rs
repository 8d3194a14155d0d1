//! Secret handling for database credentials.
//!
//! Passwords are held in zeroizing containers and never rendered by `Debug`
//! or `Display`.

pub mod secret;

pub use secret::SecretString;

/// Placeholder printed wherever a secret would otherwise appear
pub const REDACTED: &str = "***";
