//! # Request Pipeline Engine
//!
//! Per-request pipeline construction, authentication-header synthesis,
//! per-hop token rewriting, and the streaming proxy loop that chains
//! modules together.

mod engine;
pub mod headers;
mod pipeline;
mod plan;

pub use engine::ProxyService;
pub use pipeline::{build_pipeline, ModuleInstance};
pub use plan::{apply_auth_headers, apply_auth_response};
