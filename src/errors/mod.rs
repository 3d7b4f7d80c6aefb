//! # Error Handling
//!
//! Error types for the Okapi gateway, built on `thiserror`.

mod types;

pub use types::{OkapiError, Result};
