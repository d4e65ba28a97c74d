//! Local data directory resolution
//!
//! Model weights live directly under a single cache directory, by default
//! `<home>/onprem_data`. The directory is carried around as an explicit
//! [`DataDirectory`] value rather than looked up from global state.

use std::path::{Path, PathBuf};
use tracing::debug;

use common::error::{Error, Result};

/// Name of the cache directory created under the user's home directory
pub const DATA_DIR_NAME: &str = "onprem_data";

/// A cache directory that exists on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDirectory {
    path: PathBuf,
}

impl DataDirectory {
    /// Resolves the default `<home>/onprem_data`, creating it if absent
    pub fn resolve() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("unable to determine the home directory".to_string()))?;
        Self::at(home.join(DATA_DIR_NAME))
    }

    /// Uses an explicit directory, creating it if absent
    pub fn at(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_dir() {
            debug!("Creating data directory {}", path.display());
            // create_dir_all tolerates a concurrent creator winning the race
            std::fs::create_dir_all(&path)?;
        }
        Ok(Self { path })
    }

    /// Resolves `override_dir` if given, else the default location
    pub fn resolve_or(override_dir: Option<&Path>) -> Result<Self> {
        match override_dir {
            Some(dir) => Self::at(dir),
            None => Self::resolve(),
        }
    }

    /// Returns the directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Joins a file name onto the directory
    pub fn join(&self, file_name: impl AsRef<Path>) -> PathBuf {
        self.path.join(file_name)
    }
}

impl AsRef<Path> for DataDirectory {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_creates_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("nested").join(DATA_DIR_NAME);
        let dir = DataDirectory::at(&target).unwrap();
        assert!(target.is_dir());
        assert_eq!(dir.path(), target.as_path());
    }

    #[test]
    fn at_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let first = DataDirectory::at(tmp.path().join("cache")).unwrap();
        let second = DataDirectory::at(tmp.path().join("cache")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn at_fails_when_path_is_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("occupied");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(DataDirectory::at(&file), Err(Error::Io(_))));
    }

    #[cfg(unix)]
    #[test]
    fn resolve_creates_data_dir_under_home() {
        let tmp = tempfile::tempdir().unwrap();
        let previous = std::env::var_os("HOME");
        std::env::set_var("HOME", tmp.path());

        let resolved = DataDirectory::resolve();

        match previous {
            Some(home) => std::env::set_var("HOME", home),
            None => std::env::remove_var("HOME"),
        }
        let dir = resolved.unwrap();
        let expected = tmp.path().join(DATA_DIR_NAME);
        assert_eq!(dir.path(), expected.as_path());
        assert!(expected.is_dir());
    }

    #[test]
    fn resolve_or_prefers_override() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDirectory::resolve_or(Some(tmp.path())).unwrap();
        assert_eq!(dir.path(), tmp.path());
        assert_eq!(dir.join("model.bin"), tmp.path().join("model.bin"));
    }
}
