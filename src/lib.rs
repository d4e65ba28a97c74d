//! onprem
//!
//! A client for running large language models locally: fetch and cache
//! model files, prompt them, and answer questions over ingested documents.

pub mod cli;
pub mod llm;

pub use common::error::{Error, Result};
pub use llm::{Llm, LlmBuilder, LlmOptions};
pub use model_manager::{FetchOutcome, ModelReference};
pub use inference_engine::PromptTemplate;
pub use retrieval::{Answer, Document, DEFAULT_NUM_SOURCE_DOCS};
pub use settings::{DataDirectory, Settings};
