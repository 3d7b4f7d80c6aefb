//! # HTTP Interface
//!
//! The admin surface for modules, tenants and deployments, and the gateway
//! fallback route that feeds everything else into the proxy engine. Every
//! successful module or tenant write sends the cluster reload signal before
//! replying.

mod deployments;
mod error;
mod health;
mod modules;
mod routes;
mod server;
mod tenants;

pub use error::{ApiError, ApiResult};
pub use routes::{build_router, ApiState};
pub use server::start_server;
