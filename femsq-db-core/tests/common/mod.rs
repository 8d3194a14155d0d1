//! Shared test doubles for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use femsq_db_core::pool::{ConnectionSignature, PoolBackend};
use femsq_db_core::{ConnectionConfiguration, FemsqError, Result};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Pool handed out by [`CountingBackend`]
#[derive(Debug)]
pub struct FakePool {
    pub id: usize,
    pub uri: String,
}

/// Connection leased from a [`FakePool`]
#[derive(Debug)]
pub struct FakeConnection {
    pub pool_id: usize,
    pub uri: String,
}

/// Backend that counts builds and refuses configured hosts.
#[derive(Default)]
pub struct CountingBackend {
    builds: AtomicUsize,
    closes: AtomicUsize,
    leases: AtomicUsize,
    failing_hosts: Mutex<HashSet<String>>,
    build_delay: Duration,
}

impl CountingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose builds take `delay`, widening race windows.
    pub fn with_build_delay(delay: Duration) -> Self {
        Self {
            build_delay: delay,
            ..Self::default()
        }
    }

    /// Makes builds for `host` fail.
    pub fn refuse_host(&self, host: &str) {
        self.failing_hosts.lock().unwrap().insert(host.to_owned());
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn leases(&self) -> usize {
        self.leases.load(Ordering::SeqCst)
    }

    fn refuses(&self, signature: &ConnectionSignature) -> bool {
        let target = signature.target();
        let host = target.split(':').next().unwrap_or_default();
        self.failing_hosts.lock().unwrap().contains(host)
    }
}

#[async_trait]
impl PoolBackend for CountingBackend {
    type Pool = Arc<FakePool>;
    type Connection = FakeConnection;

    async fn build(&self, signature: &ConnectionSignature) -> Result<Self::Pool> {
        let id = self.builds.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.build_delay.is_zero() {
            tokio::time::sleep(self.build_delay).await;
        }
        if self.refuses(signature) {
            return Err(FemsqError::connection_failed(
                format!("failed to create pool for {}", signature.target()),
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
            ));
        }
        Ok(Arc::new(FakePool {
            id,
            uri: signature.uri.clone(),
        }))
    }

    async fn lease(&self, pool: &Self::Pool) -> Result<Self::Connection> {
        self.leases.fetch_add(1, Ordering::SeqCst);
        Ok(FakeConnection {
            pool_id: pool.id,
            uri: pool.uri.clone(),
        })
    }

    async fn validate(&self, _connection: &mut Self::Connection) -> Result<()> {
        Ok(())
    }

    async fn close(&self, _pool: Self::Pool) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Valid credentials configuration for `host`.
pub fn sample_config(host: &str) -> ConnectionConfiguration {
    ConnectionConfiguration::new(host, Some(1433), "femsq").with_credentials("femsq_app", "Pa55word!")
}
