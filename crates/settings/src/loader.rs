//! Layered settings loading
//!
//! Sources, lowest priority first: built-in defaults, the TOML file, then
//! `ONPREM__SECTION__KEY` environment variables.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use config::{Config, Environment, File, FileFormat};
use tracing::debug;

use common::error::{Error, Result};
use crate::defaults::ENV_PREFIX;
use crate::schema::Settings;

/// Returns `<config_dir>/onprem/config.toml`, if the platform has a config dir
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("onprem").join("config.toml"))
}

/// Builder for [`Settings`]
#[derive(Debug, Default)]
pub struct SettingsLoader {
    file: Option<PathBuf>,
    required: bool,
    env: Option<HashMap<String, String>>,
}

impl SettingsLoader {
    /// Creates a loader reading the default file, if present, and the process environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads an explicit file, which then must exist
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self.required = true;
        self
    }

    /// Replaces the process environment with a fixed map
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    /// Merges all sources and validates the result
    pub fn load(self) -> Result<Settings> {
        let file = self.file.or_else(default_config_file);

        let mut builder = Config::builder();
        if let Some(path) = file.as_deref() {
            debug!("Reading settings from {}", path.display());
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(self.required),
            );
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .source(self.env),
        );

        let settings: Settings = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Loads settings from `path` (or the default location) and the environment
pub fn load(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => SettingsLoader::new().with_file(path).load(),
        None => SettingsLoader::new().load(),
    }
}
