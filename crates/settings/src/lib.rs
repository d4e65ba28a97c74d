//! Configuration management for onprem
//!
//! This crate provides the settings schema, layered loading from TOML files
//! and the environment, and resolution of the local model data directory.

pub mod defaults;
pub mod loader;
pub mod paths;
pub mod schema;

// Re-export commonly used types
pub use defaults::{DEFAULT_EMBEDDING_MODEL, DEFAULT_LARGER_URL, DEFAULT_MODEL_URL};
pub use loader::{load, SettingsLoader};
pub use paths::DataDirectory;
pub use schema::{
    EmbeddingSettings, EngineSettings, GenerationSettings, LoggingSettings, ModelSettings,
    Settings,
};
