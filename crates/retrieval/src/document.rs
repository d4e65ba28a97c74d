//! Retrieved document chunks

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

/// Metadata key holding the originating file path
pub const SOURCE_KEY: &str = "source";

/// A chunk of an ingested document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    /// Creates a chunk with no metadata
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Adds one metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// File this chunk came from, if the ingester recorded it
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(String::as_str)
    }
}
