//! Built-in default values

/// Model fetched when nothing else is configured
pub const DEFAULT_MODEL_URL: &str = "https://huggingface.co/TheBloke/Wizard-Vicuna-7B-Uncensored-GGML/resolve/main/Wizard-Vicuna-7B-Uncensored.ggmlv3.q4_0.bin";

/// Model fetched when `use_larger` is set
pub const DEFAULT_LARGER_URL: &str = "https://huggingface.co/TheBloke/WizardLM-13B-V1.2-GGML/resolve/main/wizardlm-13b-v1.2.ggmlv3.q4_0.bin";

/// Sentence-transformers model used for ingestion and retrieval
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

pub const DEFAULT_MAX_TOKENS: u32 = 512;
pub const DEFAULT_N_CTX: u32 = 2048;
pub const DEFAULT_N_BATCH: u32 = 1024;

/// llama.cpp executable driven by the subprocess engine
pub const DEFAULT_ENGINE_BINARY: &str = "llama-cli";

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Prefix for environment overrides, e.g. `ONPREM__GENERATION__MAX_TOKENS`
pub const ENV_PREFIX: &str = "ONPREM";
