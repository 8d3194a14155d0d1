//! Connection factory and the reconnection protocol built on it.

pub mod coordinator;
pub mod factory;

pub use coordinator::{ConnectionStatus, DEFAULT_TEST_TIMEOUT_SECS, ReconnectionCoordinator};
pub use factory::{ConnectionFactory, build_uri, signature_for};
