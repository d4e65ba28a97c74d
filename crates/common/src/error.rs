//! Error types for the common crate
//!
//! This module defines the error type shared by every onprem crate.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for onprem operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for onprem operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The model weight file is not present at its resolved path
    #[error(
        "The LLM model {model} does not appear to have been downloaded to {}. \
         Execute the download_model() method to download it.",
        path.display()
    )]
    ModelNotDownloaded {
        /// File name of the model
        model: String,
        /// Path where the file was expected
        path: PathBuf,
    },

    /// No vector index has been built by the ingester yet
    #[error("A vector database has not yet been created. Please call the ingest method.")]
    NoIndex,

    /// Transport or HTTP status failure while fetching a model
    #[error("Download error: {0}")]
    Download(String),

    /// Inference error
    #[error("Inference error: {0}")]
    Inference(String),

    /// Invalid argument error
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Unsupported operation error
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}

impl Error {
    /// Returns true if the model file is missing
    pub fn is_model_missing(&self) -> bool {
        matches!(self, Error::ModelNotDownloaded { .. })
    }

    /// Returns true if no index has been built yet
    pub fn is_no_index(&self) -> bool {
        matches!(self, Error::NoIndex)
    }
}
