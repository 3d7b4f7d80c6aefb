//! # Runtime Services
//!
//! The in-memory state the request path reads: the module catalog, the
//! tenant registry and the discovery map, plus the cluster-sync mechanism
//! that keeps the first two converged across gateway nodes.
//!
//! Catalog and registry hand out copy-on-write snapshots: readers clone an
//! `Arc` and iterate without holding any lock, admin writes swap in a new
//! map. A reload after a cluster signal is therefore a single atomic swap
//! and readers never observe a partially applied catalog.

mod catalog;
mod discovery;
mod sync;
mod tenants;

pub use catalog::{CatalogSnapshot, ModuleCatalog};
pub use discovery::DiscoveryManager;
pub use sync::{ClusterSync, ConfBus, ConfStore, CONF_MODULES_TOPIC};
pub use tenants::TenantRegistry;
