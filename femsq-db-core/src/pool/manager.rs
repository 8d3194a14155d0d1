//! Single-pool state machine.
//!
//! ```text
//! Empty  --connect(sig)-->   Active(sig)
//! Active(sig) --connect(sig)-->  Active(sig)     (reuse)
//! Active(sig) --connect(sig')--> Active(sig')    (close old, build new)
//! Active --invalidate()--> Empty
//! *      --close()-->      Closed                (terminal)
//! ```
//!
//! Every transition runs under one async mutex that is held across the pool
//! build, so concurrent callers with the same signature trigger one build.
//! Leasing happens after the lock is released.

use super::{ConnectionSignature, PoolBackend};
use crate::{FemsqError, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Observable state of a [`PoolManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// No pool built; the next `connect` builds one
    Empty,
    /// A pool is serving one signature
    Active,
    /// Shut down; `connect` fails
    Closed,
}

struct PoolHandle<P> {
    pool: P,
    signature: ConnectionSignature,
}

enum Slot<P> {
    Empty,
    Active(PoolHandle<P>),
    Closed,
}

impl<P> Slot<P> {
    const fn state(&self) -> PoolState {
        match self {
            Self::Empty => PoolState::Empty,
            Self::Active(_) => PoolState::Active,
            Self::Closed => PoolState::Closed,
        }
    }
}

/// Owns at most one pool and rebuilds it when the signature changes.
pub struct PoolManager<B: PoolBackend> {
    backend: Arc<B>,
    name: &'static str,
    slot: Mutex<Slot<B::Pool>>,
}

impl<B: PoolBackend> PoolManager<B> {
    /// Creates an empty manager. `name` labels its log records.
    pub fn new(backend: Arc<B>, name: &'static str) -> Self {
        Self {
            backend,
            name,
            slot: Mutex::new(Slot::Empty),
        }
    }

    /// Leases a connection from the pool for `signature`, building or
    /// replacing the pool first when needed.
    ///
    /// # Errors
    /// `FemsqError::PoolOperation` after [`close`](Self::close);
    /// `FemsqError::ConnectionOpen` when the pool cannot be built or leased from.
    pub async fn connect(&self, signature: &ConnectionSignature) -> Result<B::Connection> {
        let pool = self.pool_for(signature).await?;
        self.backend.lease(&pool).await
    }

    async fn pool_for(&self, signature: &ConnectionSignature) -> Result<B::Pool> {
        let mut slot = self.slot.lock().await;

        match &*slot {
            Slot::Closed => {
                return Err(FemsqError::pool_operation(format!(
                    "{} pool manager is closed",
                    self.name
                )));
            }
            Slot::Active(handle) if handle.signature == *signature => {
                debug!(pool = self.name, server = %signature.target(), "Reusing connection pool");
                return Ok(handle.pool.clone());
            }
            Slot::Active(_) | Slot::Empty => {}
        }

        if let Slot::Active(previous) = std::mem::replace(&mut *slot, Slot::Empty) {
            info!(
                pool = self.name,
                from = %previous.signature.target(),
                to = %signature.target(),
                "Connection settings changed, rebuilding pool"
            );
            self.close_quietly(previous).await;
        }

        let pool = self.backend.build(signature).await?;
        info!(pool = self.name, server = %signature.target(), "Connection pool built");
        *slot = Slot::Active(PoolHandle {
            pool: pool.clone(),
            signature: signature.clone(),
        });
        Ok(pool)
    }

    /// Discards the current pool. The next `connect` rebuilds lazily.
    pub async fn invalidate(&self) {
        let mut slot = self.slot.lock().await;
        if matches!(*slot, Slot::Closed) {
            return;
        }
        if let Slot::Active(handle) = std::mem::replace(&mut *slot, Slot::Empty) {
            info!(pool = self.name, server = %handle.signature.target(), "Connection pool invalidated");
            self.close_quietly(handle).await;
        }
    }

    /// Closes the current pool and refuses further connections.
    pub async fn close(&self) {
        let mut slot = self.slot.lock().await;
        if let Slot::Active(handle) = std::mem::replace(&mut *slot, Slot::Closed) {
            self.close_quietly(handle).await;
        }
        debug!(pool = self.name, "Pool manager closed");
    }

    /// Current state.
    pub async fn state(&self) -> PoolState {
        self.slot.lock().await.state()
    }

    /// Signature of the active pool, if any.
    pub async fn active_signature(&self) -> Option<ConnectionSignature> {
        match &*self.slot.lock().await {
            Slot::Active(handle) => Some(handle.signature.clone()),
            Slot::Empty | Slot::Closed => None,
        }
    }

    async fn close_quietly(&self, handle: PoolHandle<B::Pool>) {
        let target = handle.signature.target();
        match self.backend.close(handle.pool).await {
            Ok(()) => debug!(pool = self.name, server = %target, "Closed connection pool"),
            Err(e) => warn!(pool = self.name, server = %target, error = %e, "Failed to close connection pool"),
        }
    }
}
