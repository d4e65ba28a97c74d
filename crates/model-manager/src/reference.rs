//! Model references
//!
//! A reference pairs a source URL with the local file name derived from it.

use std::fmt;
use std::path::{Path, PathBuf};
use reqwest::Url;

use common::error::{Error, Result};
use settings::DataDirectory;

/// A downloadable weight file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelReference {
    url: String,
    file_name: String,
}

impl ModelReference {
    /// Parses `url` and derives the local file name from its last path segment
    ///
    /// Surrounding whitespace is ignored. Query strings and fragments do not
    /// take part in the file name.
    pub fn new(url: impl AsRef<str>) -> Result<Self> {
        let url = url.as_ref().trim();
        let parsed = Url::parse(url)
            .map_err(|e| Error::InvalidArgument(format!("invalid model URL {:?}: {}", url, e)))?;

        let file_name = parsed
            .path_segments()
            .and_then(|segments| segments.last())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                Error::InvalidArgument(format!("model URL {:?} does not name a file", url))
            })?
            .to_string();

        Ok(Self {
            url: url.to_string(),
            file_name,
        })
    }

    /// Returns the URL as given, trimmed
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Basename of the URL
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Path of the file inside `dir`
    pub fn path_in(&self, dir: &DataDirectory) -> PathBuf {
        dir.join(&self.file_name)
    }

    /// Path of the file inside `override_dir`, or the default data directory
    ///
    /// The chosen directory is created if it does not exist yet.
    pub fn resolve_path(&self, override_dir: Option<&Path>) -> Result<PathBuf> {
        let dir = DataDirectory::resolve_or(override_dir)?;
        Ok(self.path_in(&dir))
    }
}

impl fmt::Display for ModelReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name)
    }
}
