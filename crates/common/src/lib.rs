//! Visage Common Utilities
//!
//! Shared infrastructure for all Visage crates:
//! - Error types and result aliases
//! - Processing clock and frame timing utilities
//! - Tracing/logging initialization
//! - Configuration loading and threshold validation

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
