//! # Cluster Configuration Sync
//!
//! Keeps every gateway node's catalog converged on the shared store.
//! Writers bump a monotonic timestamp (persisted under a fixed key) and
//! publish it on the cluster bus; a node that receives a timestamp newer
//! than its own drops its in-memory catalog and repopulates from the store.
//! Lost messages are tolerated (the next write resyncs), stale messages
//! are ignored, and a node's own publish is a no-op.

use crate::domain::{ModuleDescriptor, Tenant};
use crate::errors::Result;
use crate::services::{ModuleCatalog, TenantRegistry};
use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Bus topic carrying reload timestamps
pub const CONF_MODULES_TOPIC: &str = "okapi.conf.modules";

/// Store operations the sync protocol depends on. Implemented by the sqlx
/// repositories; tests substitute an in-memory stub.
#[async_trait]
pub trait ConfStore: Send + Sync {
    /// Return a value strictly greater than any previously stored for the
    /// modules key, and greater than `current`
    async fn advance_timestamp(&self, current: i64) -> Result<i64>;

    async fn load_modules(&self) -> Result<Vec<ModuleDescriptor>>;

    async fn load_tenants(&self) -> Result<Vec<Tenant>>;
}

/// Intra-cluster bus handle for the configuration topic
#[derive(Debug, Clone)]
pub struct ConfBus {
    tx: broadcast::Sender<i64>,
}

impl ConfBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    /// Publish a timestamp. Bus failures are logged only: the write behind
    /// it is already persisted and will be picked up on the next sync.
    pub fn publish(&self, ts: i64) {
        if let Err(e) = self.tx.send(ts) {
            debug!(topic = CONF_MODULES_TOPIC, error = %e, "No bus subscribers for reload signal");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<i64> {
        self.tx.subscribe()
    }
}

impl Default for ConfBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-node reload state and the signal routine admin writes call
pub struct ClusterSync {
    local_ts: AtomicI64,
    bus: ConfBus,
    store: Arc<dyn ConfStore>,
    catalog: Arc<ModuleCatalog>,
    tenants: Arc<TenantRegistry>,
}

impl ClusterSync {
    pub fn new(
        bus: ConfBus,
        store: Arc<dyn ConfStore>,
        catalog: Arc<ModuleCatalog>,
        tenants: Arc<TenantRegistry>,
    ) -> Self {
        Self { local_ts: AtomicI64::new(-1), bus, store, catalog, tenants }
    }

    /// The newest timestamp this node has produced or applied
    pub fn local_ts(&self) -> i64 {
        self.local_ts.load(Ordering::SeqCst)
    }

    /// Advance the shared timestamp and announce it on the bus. Called by
    /// every admin write path after the store mutation succeeded.
    pub async fn send_reload_signal(&self) -> Result<()> {
        let current = self.local_ts();
        let new_ts = self.store.advance_timestamp(current).await?;
        self.local_ts.fetch_max(new_ts, Ordering::SeqCst);
        debug!(topic = CONF_MODULES_TOPIC, ts = new_ts, "Publishing reload signal");
        self.bus.publish(new_ts);
        Ok(())
    }

    /// Repopulate catalog and tenant registry from the store. Each is an
    /// atomic snapshot swap, so requests in flight keep their old view.
    pub async fn reload(&self) -> Result<()> {
        let modules = self.store.load_modules().await?;
        let tenants = self.store.load_tenants().await?;
        info!(modules = modules.len(), tenants = tenants.len(), "Reloaded configuration from store");
        self.catalog.replace_all(modules);
        self.tenants.replace_all(tenants);
        Ok(())
    }

    /// Process one bus message. Returns true if a reload happened.
    pub async fn handle_bus_message(&self, received_ts: i64) -> Result<bool> {
        if received_ts <= self.local_ts() {
            return Ok(false);
        }
        self.reload().await?;
        self.local_ts.fetch_max(received_ts, Ordering::SeqCst);
        Ok(true)
    }

    /// Subscribe to the bus and apply reload signals until the bus closes
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ts) => {
                        if let Err(e) = self.handle_bus_message(ts).await {
                            // Keep serving the old catalog; the next signal retries
                            error!(ts, error = %e, "Reload after bus message failed");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Reload signals lagged; will catch up on the next one");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
