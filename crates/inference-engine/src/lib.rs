//! Inference engine adapters for onprem
//!
//! This crate defines the seam between the client facade and a text
//! generation runtime, plus adapters for llama.cpp.

pub mod command;
pub mod engine;
#[cfg(feature = "llama")]
pub mod llama;
pub mod template;

// Re-export commonly used types
pub use command::{CommandEngine, CommandEngineLoader};
pub use engine::{stdout_stream, EngineConfig, EngineLoader, InferenceEngine, TokenCallback};
#[cfg(feature = "llama")]
pub use llama::{LlamaEngine, LlamaEngineLoader};
pub use template::PromptTemplate;
