//! Ingester and index seams

use std::path::Path;
use std::sync::Arc;
use async_trait::async_trait;
use tracing::debug;

use common::error::Result;
use common::utils::split_list;
use settings::EmbeddingSettings;
use crate::document::Document;

/// A searchable store of embedded document chunks
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Returns the `k` most relevant chunks for `query`, most relevant first
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Document>>;

    async fn add_documents(&self, documents: &[Document]) -> Result<()>;
}

/// Turns a directory of files into a [`VectorIndex`]
#[async_trait]
pub trait Ingester: Send + Sync {
    /// Indexes every document under `source_directory`
    ///
    /// Documents that were already ingested are expected to be skipped.
    async fn ingest(&self, source_directory: &Path) -> Result<()>;

    /// The index built so far, or `None` if nothing has been ingested
    fn index(&self) -> Option<Arc<dyn VectorIndex>>;
}

/// Creates an ingester bound to an embedding model
pub trait IngesterFactory: Send + Sync {
    fn build(&self, embedding: &EmbeddingSettings) -> Result<Box<dyn Ingester>>;
}

/// Adds `documents` to `index` in batches of at most `batch_size`
///
/// Vector stores usually cap how many embeddings one insert may carry.
/// Returns the number of batches sent.
pub async fn add_in_batches(
    index: &dyn VectorIndex,
    documents: &[Document],
    batch_size: usize,
) -> Result<usize> {
    let mut batches = 0;
    for batch in split_list(documents, batch_size)? {
        index.add_documents(batch).await?;
        batches += 1;
        debug!("Added batch {} ({} documents)", batches, batch.len());
    }
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingIndex {
        batches: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl VectorIndex for RecordingIndex {
        async fn retrieve(&self, _query: &str, _k: usize) -> Result<Vec<Document>> {
            Ok(Vec::new())
        }

        async fn add_documents(&self, documents: &[Document]) -> Result<()> {
            self.batches.lock().push(documents.len());
            Ok(())
        }
    }

    #[tokio::test]
    async fn documents_are_sent_in_bounded_batches() {
        let index = RecordingIndex::default();
        let documents: Vec<Document> = (0..10).map(|i| Document::new(i.to_string())).collect();

        let sent = add_in_batches(&index, &documents, 4).await.unwrap();

        assert_eq!(sent, 3);
        assert_eq!(*index.batches.lock(), vec![4, 4, 2]);
    }

    #[tokio::test]
    async fn nothing_to_add_sends_nothing() {
        let index = RecordingIndex::default();
        assert_eq!(add_in_batches(&index, &[], 4).await.unwrap(), 0);
        assert!(index.batches.lock().is_empty());
    }

    #[tokio::test]
    async fn zero_batch_size_is_rejected() {
        let index = RecordingIndex::default();
        let documents = vec![Document::new("a")];
        assert!(add_in_batches(&index, &documents, 0).await.is_err());
    }
}
