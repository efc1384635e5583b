//! # PCO Query Common Library
//!
//! Shared code for the PCO Query service:
//! - Error types
//! - TOML configuration loading
//! - CSV parsing and serialization
//! - Sliding-window rate limiting for outbound API calls

pub mod config;
pub mod csv;
pub mod error;
pub mod rate_limiter;

pub use error::{Error, Result};
pub use rate_limiter::SlidingWindowLimiter;
