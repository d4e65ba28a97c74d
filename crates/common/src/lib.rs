//! Common utilities and types for onprem
//!
//! This crate provides shared functionality used across the onprem crates,
//! including the error type and small utility functions.

pub mod error;
pub mod utils;

// Re-export commonly used types
pub use error::{Error, Result};
