//! In-process llama.cpp backend

use std::sync::Arc;
use async_trait::async_trait;
use llama_cpp::{standard_sampler::StandardSampler, LlamaModel, LlamaParams, SessionParams};
use tracing::info;

use common::error::{Error, Result};
use crate::engine::{EngineConfig, EngineLoader, InferenceEngine};

/// Loads GGML/GGUF files with the `llama_cpp` bindings
#[derive(Debug, Default, Clone, Copy)]
pub struct LlamaEngineLoader;

impl EngineLoader for LlamaEngineLoader {
    fn load(&self, config: EngineConfig) -> Result<Box<dyn InferenceEngine>> {
        let mut params = LlamaParams::default();
        if let Some(layers) = config.n_gpu_layers {
            params.n_gpu_layers = layers;
        }

        info!("Loading {} in process", config.model_path.display());
        let model = LlamaModel::load_from_file(&config.model_path, params)
            .map_err(|err| Error::Inference(format!("failed to load model: {err:?}")))?;

        Ok(Box::new(LlamaEngine {
            model: Arc::new(model),
            config: Arc::new(config),
        }))
    }
}

pub struct LlamaEngine {
    model: Arc<LlamaModel>,
    config: Arc<EngineConfig>,
}

impl LlamaEngine {
    fn complete(model: &LlamaModel, config: &EngineConfig, prompt: &str) -> Result<String> {
        let mut session_params = SessionParams::default();
        session_params.n_ctx = config.n_ctx;
        session_params.n_batch = config.n_batch;

        let mut session = model
            .create_session(session_params)
            .map_err(|err| Error::Inference(format!("failed to create llama session: {err:?}")))?;

        session
            .advance_context(prompt)
            .map_err(|err| Error::Inference(format!("failed to advance llama context: {err}")))?;

        let completions = session
            .start_completing_with(StandardSampler::default(), config.max_tokens as usize)
            .map_err(|err| Error::Inference(format!("failed to start llama completion: {err:?}")))?
            .into_strings();

        let mut output = String::new();
        for chunk in completions {
            if chunk.is_empty() {
                continue;
            }
            config.emit(&chunk);
            output.push_str(&chunk);
        }
        Ok(output)
    }
}

#[async_trait]
impl InferenceEngine for LlamaEngine {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let model = self.model.clone();
        let config = self.config.clone();
        let prompt = prompt.to_string();

        tokio::task::spawn_blocking(move || Self::complete(&model, &config, &prompt))
            .await
            .map_err(|e| Error::Internal(format!("llama worker panicked: {}", e)))?
    }
}
