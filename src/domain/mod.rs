//! # Domain Model
//!
//! The data model the pipeline consumes: module descriptors with their
//! routing entries, tenants with their enablement sets, and deployment
//! records mapping module ids to running instance URLs.

mod deployment;
mod module;
mod routing;
mod tenant;

pub use deployment::DeploymentDescriptor;
pub use module::{
    EnvEntry, InterfaceDescriptor, LaunchDescriptor, ModuleBrief, ModuleDescriptor, Permission,
};
pub use routing::{ProxyType, RoutingEntry};
pub use tenant::Tenant;
