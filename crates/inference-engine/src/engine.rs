//! Inference engine seam
//!
//! An engine is bound to one local model file. Everything that shapes
//! generation, including where streamed tokens go, is fixed when the engine
//! is loaded.

use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use async_trait::async_trait;

use common::error::Result;
use settings::GenerationSettings;

/// Receives generated text as it is produced
pub type TokenCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Callback that echoes tokens to stdout as they arrive
pub fn stdout_stream() -> TokenCallback {
    Arc::new(|token: &str| {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(token.as_bytes());
        let _ = out.flush();
    })
}

/// Load-time configuration of an engine
#[derive(Clone)]
pub struct EngineConfig {
    pub model_path: PathBuf,
    pub max_tokens: u32,
    pub n_ctx: u32,
    pub n_batch: u32,
    /// Layers offloaded to the GPU; `None` leaves the engine default
    pub n_gpu_layers: Option<u32>,
    pub verbose: bool,
    pub on_token: Option<TokenCallback>,
}

impl EngineConfig {
    /// Builds the config for `model_path`, streaming to stdout unless muted
    pub fn from_settings(model_path: impl Into<PathBuf>, generation: &GenerationSettings) -> Self {
        Self {
            model_path: model_path.into(),
            max_tokens: generation.max_tokens,
            n_ctx: generation.n_ctx,
            n_batch: generation.n_batch,
            n_gpu_layers: generation.n_gpu_layers,
            verbose: generation.verbose,
            on_token: if generation.mute_stream {
                None
            } else {
                Some(stdout_stream())
            },
        }
    }

    /// Overrides the streaming callback; `None` disables streaming
    pub fn with_token_callback(mut self, callback: Option<TokenCallback>) -> Self {
        self.on_token = callback;
        self
    }

    /// Forwards `token` to the streaming callback, if any
    pub fn emit(&self, token: &str) {
        if let Some(callback) = &self.on_token {
            callback(token);
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("model_path", &self.model_path)
            .field("max_tokens", &self.max_tokens)
            .field("n_ctx", &self.n_ctx)
            .field("n_batch", &self.n_batch)
            .field("n_gpu_layers", &self.n_gpu_layers)
            .field("verbose", &self.verbose)
            .field("streaming", &self.on_token.is_some())
            .finish()
    }
}

/// A loaded text generation runtime
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Generates a completion for `prompt`, streaming through the configured callback
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Builds engines for local model files
pub trait EngineLoader: Send + Sync {
    fn load(&self, config: EngineConfig) -> Result<Box<dyn InferenceEngine>>;
}
