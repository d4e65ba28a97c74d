//! Ingestion and retrieval for onprem
//!
//! Embedding, storage and ranking belong to the ingester implementation.
//! This crate defines the seams the client facade talks to and composes
//! retrieved context with a question into a single prompt.

pub mod document;
pub mod ingester;
pub mod qa;

// Re-export commonly used types
pub use document::Document;
pub use ingester::{add_in_batches, Ingester, IngesterFactory, VectorIndex};
pub use qa::{Answer, StuffPrompt, DEFAULT_NUM_SOURCE_DOCS};
