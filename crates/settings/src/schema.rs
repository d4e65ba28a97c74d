//! Configuration schema
//!
//! Every section deserializes with defaults for missing keys, so a partial
//! TOML file or a handful of environment variables is always enough.

use std::collections::HashMap;
use std::path::PathBuf;
use serde::{Deserialize, Serialize};

use common::error::{Error, Result};
use crate::defaults::*;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub model: ModelSettings,
    pub generation: GenerationSettings,
    pub embedding: EmbeddingSettings,
    pub engine: EngineSettings,
    pub logging: LoggingSettings,
}

/// Which weight file to use and how to fetch it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// URL of the weight file; its basename is the local file name
    pub url: String,

    /// Use [`DEFAULT_LARGER_URL`] instead of `url`
    pub use_larger: bool,

    /// Download directory; `<home>/onprem_data` when unset
    pub download_path: Option<PathBuf>,

    /// Ask before downloading
    pub confirm: bool,

    /// Verify TLS certificates when downloading
    pub verify_tls: bool,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_MODEL_URL.to_string(),
            use_larger: false,
            download_path: None,
            confirm: true,
            verify_tls: true,
        }
    }
}

impl ModelSettings {
    /// Returns the URL actually in effect after applying `use_larger`
    pub fn effective_url(&self) -> &str {
        if self.use_larger {
            DEFAULT_LARGER_URL
        } else {
            self.url.trim()
        }
    }
}

/// Parameters baked into the inference engine when it is built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub max_tokens: u32,
    pub n_ctx: u32,
    pub n_batch: u32,
    pub n_gpu_layers: Option<u32>,
    /// Suppress token streaming to stdout
    pub mute_stream: bool,
    pub verbose: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            n_ctx: DEFAULT_N_CTX,
            n_batch: DEFAULT_N_BATCH,
            n_gpu_layers: None,
            mute_stream: false,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model_name: String,
    pub model_kwargs: HashMap<String, String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_EMBEDDING_MODEL.to_string(),
            model_kwargs: HashMap::from([("device".to_string(), "cpu".to_string())]),
        }
    }
}

/// Subprocess engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub binary: PathBuf,
    pub extra_args: Vec<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_ENGINE_BINARY),
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive, overridden by `RUST_LOG`
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            json: false,
        }
    }
}

impl Settings {
    /// Rejects values no engine or download could work with
    pub fn validate(&self) -> Result<()> {
        if self.model.effective_url().is_empty() {
            return Err(Error::Config("model.url must not be empty".to_string()));
        }
        for (name, value) in [
            ("generation.max_tokens", self.generation.max_tokens),
            ("generation.n_ctx", self.generation.n_ctx),
            ("generation.n_batch", self.generation.n_batch),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than zero", name)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.generation.max_tokens, 512);
        assert_eq!(settings.generation.n_ctx, 2048);
        assert_eq!(settings.generation.n_batch, 1024);
        assert_eq!(settings.embedding.model_kwargs.get("device").map(String::as_str), Some("cpu"));
    }

    #[test]
    fn use_larger_overrides_url() {
        let mut model = ModelSettings {
            url: "https://example.com/a.bin".to_string(),
            ..Default::default()
        };
        assert_eq!(model.effective_url(), "https://example.com/a.bin");
        model.use_larger = true;
        assert_eq!(model.effective_url(), DEFAULT_LARGER_URL);
    }

    #[test]
    fn zero_context_is_rejected() {
        let mut settings = Settings::default();
        settings.generation.n_ctx = 0;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("generation.n_ctx"));
    }

    #[test]
    fn blank_url_is_rejected() {
        let mut settings = Settings::default();
        settings.model.url = "   ".to_string();
        assert!(matches!(settings.validate(), Err(Error::Config(_))));
    }
}
