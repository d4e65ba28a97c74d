//! llama.cpp command-line backend
//!
//! Runs the llama.cpp executable once per prompt and streams its stdout back
//! through the token callback.

use std::path::PathBuf;
use std::process::Stdio;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info};

use common::error::{Error, Result};
use settings::EngineSettings;
use crate::engine::{EngineConfig, EngineLoader, InferenceEngine};

const READ_BUFFER: usize = 1024;

/// Loads [`CommandEngine`]s for a fixed executable
#[derive(Debug, Clone)]
pub struct CommandEngineLoader {
    binary: PathBuf,
    extra_args: Vec<String>,
}

impl CommandEngineLoader {
    /// Creates a loader for `binary` with no extra arguments
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            extra_args: Vec::new(),
        }
    }

    /// Creates a loader for the configured binary and arguments
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::new(settings.binary.clone()).with_args(settings.extra_args.clone())
    }

    /// Arguments passed before the prompt on every run
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }
}

impl EngineLoader for CommandEngineLoader {
    fn load(&self, config: EngineConfig) -> Result<Box<dyn InferenceEngine>> {
        info!(
            "Binding {} to {}",
            self.binary.display(),
            config.model_path.display()
        );
        Ok(Box::new(CommandEngine {
            binary: self.binary.clone(),
            extra_args: self.extra_args.clone(),
            config,
        }))
    }
}

/// Engine backed by a llama.cpp subprocess
#[derive(Debug)]
pub struct CommandEngine {
    binary: PathBuf,
    extra_args: Vec<String>,
    config: EngineConfig,
}

impl CommandEngine {
    /// Command-line arguments for one completion of `prompt`
    pub fn args(&self, prompt: &str) -> Vec<String> {
        let config = &self.config;
        let mut args = vec![
            "-m".to_string(),
            config.model_path.to_string_lossy().into_owned(),
            "-n".to_string(),
            config.max_tokens.to_string(),
            "-c".to_string(),
            config.n_ctx.to_string(),
            "-b".to_string(),
            config.n_batch.to_string(),
        ];
        if let Some(layers) = config.n_gpu_layers {
            args.push("-ngl".to_string());
            args.push(layers.to_string());
        }
        args.push("--no-display-prompt".to_string());
        args.extend(self.extra_args.iter().cloned());
        args.push("-p".to_string());
        args.push(prompt.to_string());
        args
    }
}

#[async_trait]
impl InferenceEngine for CommandEngine {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let mut child = Command::new(&self.binary)
            .args(self.args(prompt))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Inference(format!("failed to spawn {}: {}", self.binary.display(), e))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Internal("stdout handle unavailable".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Internal("stderr handle unavailable".to_string()))?;

        let mut diagnostics = Vec::new();
        let (output, _) = tokio::join!(
            stream_utf8(stdout, |text| self.config.emit(text)),
            stderr.read_to_end(&mut diagnostics),
        );
        let output = output?;

        let status = child.wait().await?;
        let diagnostics = String::from_utf8_lossy(&diagnostics);
        if self.config.verbose {
            for line in diagnostics.lines() {
                debug!(target: "llama", "{}", line);
            }
        }
        if !status.success() {
            return Err(Error::Inference(format!(
                "{} exited with status {:?}: {}",
                self.binary.display(),
                status.code(),
                diagnostics.trim()
            )));
        }

        Ok(output)
    }
}

/// Reads `reader` to the end, passing each decoded piece to `emit`
///
/// Multi-byte characters split across reads are held back until complete.
async fn stream_utf8<R, F>(mut reader: R, mut emit: F) -> Result<String>
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    let mut output = String::new();
    let mut pending: Vec<u8> = Vec::new();
    let mut buf = [0u8; READ_BUFFER];

    loop {
        let read = reader.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        pending.extend_from_slice(&buf[..read]);

        let valid = match std::str::from_utf8(&pending) {
            Ok(_) => pending.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            // Genuinely invalid bytes: take everything, lossily
            Err(_) => pending.len(),
        };
        if valid == 0 {
            continue;
        }
        let text = String::from_utf8_lossy(&pending[..valid]).into_owned();
        pending.drain(..valid);
        emit(&text);
        output.push_str(&text);
    }

    if !pending.is_empty() {
        let text = String::from_utf8_lossy(&pending).into_owned();
        emit(&text);
        output.push_str(&text);
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use parking_lot::Mutex;
    use settings::GenerationSettings;

    fn config() -> EngineConfig {
        let generation = GenerationSettings {
            mute_stream: true,
            ..Default::default()
        };
        EngineConfig::from_settings("/models/tiny.bin", &generation)
    }

    #[test]
    fn args_carry_generation_settings() {
        let mut config = config();
        config.n_gpu_layers = Some(32);
        let engine = CommandEngine {
            binary: PathBuf::from("llama-cli"),
            extra_args: vec!["--temp".to_string(), "0.2".to_string()],
            config,
        };
        let args = engine.args("Hello");
        assert_eq!(&args[..8], ["-m", "/models/tiny.bin", "-n", "512", "-c", "2048", "-b", "1024"]);
        assert!(args.windows(2).any(|w| w == ["-ngl", "32"]));
        assert!(args.windows(2).any(|w| w == ["--temp", "0.2"]));
        assert_eq!(&args[args.len() - 2..], ["-p", "Hello"]);
    }

    #[test]
    fn gpu_flag_is_omitted_by_default() {
        let engine = CommandEngine {
            binary: PathBuf::from("llama-cli"),
            extra_args: Vec::new(),
            config: config(),
        };
        assert!(!engine.args("x").iter().any(|a| a == "-ngl"));
    }

    #[test]
    fn loader_from_settings_keeps_extra_args() {
        let settings = EngineSettings {
            binary: PathBuf::from("/opt/llama/llama-cli"),
            extra_args: vec!["--temp".to_string(), "0.1".to_string()],
        };
        let loader = CommandEngineLoader::from_settings(&settings);
        assert_eq!(loader.binary, PathBuf::from("/opt/llama/llama-cli"));
        assert_eq!(loader.extra_args, ["--temp", "0.1"]);
    }

    #[tokio::test]
    async fn stream_utf8_keeps_split_characters_whole() {
        let bytes = "héllo wörld".as_bytes().to_vec();
        let (first, second) = bytes.split_at(2);
        // Chain hands out the first part on its own read, splitting the 'é'
        let reader = std::io::Cursor::new(first.to_vec()).chain(std::io::Cursor::new(second.to_vec()));
        let mut pieces = Vec::new();
        let output = stream_utf8(reader, |p| pieces.push(p.to_string())).await.unwrap();
        assert_eq!(output, "héllo wörld");
        assert_eq!(pieces.concat(), "héllo wörld");
        assert!(pieces.iter().all(|p| !p.contains('\u{FFFD}')));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn generate_streams_process_output() {
        let seen = Arc::new(Mutex::new(String::new()));
        let sink = seen.clone();
        let config = config().with_token_callback(Some(Arc::new(move |t: &str| {
            sink.lock().push_str(t)
        })));
        // `echo` prints its arguments, which end with the prompt
        let engine = CommandEngineLoader::new("echo").load(config).unwrap();
        let output = engine.generate("four").await.unwrap();
        assert!(output.trim_end().ends_with("-p four"));
        assert_eq!(seen.lock().as_str(), output);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_process_is_an_inference_error() {
        let engine = CommandEngineLoader::new("false").load(config()).unwrap();
        assert!(matches!(engine.generate("x").await, Err(Error::Inference(_))));
    }

    #[tokio::test]
    async fn missing_binary_is_an_inference_error() {
        let engine = CommandEngineLoader::new("/definitely/missing/llama-cli")
            .load(config())
            .unwrap();
        assert!(matches!(engine.generate("x").await, Err(Error::Inference(_))));
    }
}
