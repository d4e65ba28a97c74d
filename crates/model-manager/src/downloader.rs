//! Model downloader implementation
//!
//! This module fetches weight files into the local data directory. A file is
//! only fetched after the user agrees (or confirmation is switched off), and
//! it is streamed into a `.part` file that is renamed into place once the
//! whole body has arrived, so the target path never holds a truncated model.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use bytes::BytesMut;
use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use common::error::{Error, Result};
use common::utils::{chunk_count, format_bytes};
use crate::confirm::{Confirm, TerminalConfirm};
use crate::progress::{DownloadProgress, ProgressSink, TerminalProgress};
use crate::reference::ModelReference;
use crate::transport::{HttpTransport, Transport};

/// Smallest chunk written to disk between progress updates
pub const MIN_CHUNK_SIZE: usize = 1024 * 1024;

/// Suffix of the file a download is streamed into
pub const PARTIAL_SUFFIX: &str = "part";

/// Returns the write chunk size for a body of `total` bytes
///
/// Roughly a thousand updates for large files, never less than 1 MiB.
pub fn chunk_size_for(total: u64) -> usize {
    let per_mille = usize::try_from(total / 1000).unwrap_or(usize::MAX);
    per_mille.max(MIN_CHUNK_SIZE)
}

/// Options for [`ModelFetcher::ensure_downloaded`]
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Directory to download into instead of the default data directory
    pub override_dir: Option<PathBuf>,
    /// Ask before downloading
    pub interactive: bool,
    /// Verify TLS certificates
    pub verify_tls: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            override_dir: None,
            interactive: true,
            verify_tls: true,
        }
    }
}

/// What [`ModelFetcher::ensure_downloaded`] ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Downloaded { path: PathBuf, bytes: u64 },
    /// The file was already there and was left alone
    AlreadyPresent(PathBuf),
    /// The user did not confirm; nothing was written
    Declined(PathBuf),
}

impl FetchOutcome {
    /// Returns the model path this outcome refers to
    pub fn path(&self) -> &Path {
        match self {
            FetchOutcome::Downloaded { path, .. } => path,
            FetchOutcome::AlreadyPresent(path) => path,
            FetchOutcome::Declined(path) => path,
        }
    }
}

/// Downloads model weight files
pub struct ModelFetcher {
    transport: Arc<dyn Transport>,
    confirm: Arc<dyn Confirm>,
    progress: Arc<dyn ProgressSink>,
}

impl Default for ModelFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelFetcher {
    /// Creates a fetcher that talks HTTP and prompts on the terminal
    pub fn new() -> Self {
        Self {
            transport: Arc::new(HttpTransport::new()),
            confirm: Arc::new(TerminalConfirm),
            progress: Arc::new(TerminalProgress::new()),
        }
    }

    /// Replaces the HTTP transport
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Replaces the confirmation prompt
    pub fn with_confirm(mut self, confirm: Arc<dyn Confirm>) -> Self {
        self.confirm = confirm;
        self
    }

    /// Replaces the progress reporter
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Returns where `reference` lives, in `override_dir` or the default directory
    pub fn resolve_path(reference: &ModelReference, override_dir: Option<&Path>) -> Result<PathBuf> {
        reference.resolve_path(override_dir)
    }

    /// Makes sure the model file is present, asking first when interactive
    ///
    /// An existing file is only fetched again if the user explicitly asks
    /// for it; in non-interactive mode it is kept as is.
    pub async fn ensure_downloaded(
        &self,
        reference: &ModelReference,
        options: &FetchOptions,
    ) -> Result<FetchOutcome> {
        let path = Self::resolve_path(reference, options.override_dir.as_deref())?;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let exists = path.is_file();

        if exists && !options.interactive {
            debug!("{} already present at {}", reference, path.display());
            return Ok(FetchOutcome::AlreadyPresent(path));
        }

        let message = if exists {
            format!(
                "There is already a file {} in {}.\n Do you want to still download it?",
                reference,
                dir.display()
            )
        } else {
            format!(
                "You are about to download the LLM {} to the {} folder. Are you sure?",
                reference,
                dir.display()
            )
        };

        let proceed = !options.interactive || self.ask(message).await?;
        if !proceed {
            warn!("{} was not downloaded because \"Y\" was not selected.", reference);
            return Ok(FetchOutcome::Declined(path));
        }

        let bytes = self.download(reference.url(), &path, options.verify_tls).await?;
        Ok(FetchOutcome::Downloaded { path, bytes })
    }

    /// Streams `url` into `path`
    ///
    /// Returns the number of bytes written. On failure the partial file is
    /// removed and `path` is left untouched.
    pub async fn download(&self, url: &str, path: &Path, verify_tls: bool) -> Result<u64> {
        info!("Starting download of {} to {}", url, path.display());

        let staging = partial_path(path);
        let result = self.download_file(url, &staging, verify_tls).await;

        let result = match result {
            Ok(bytes) => tokio::fs::rename(&staging, path)
                .await
                .map(|()| bytes)
                .map_err(Error::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(bytes) => {
                info!("Downloaded {} ({})", path.display(), format_bytes(bytes));
                Ok(bytes)
            }
            Err(e) => {
                error!("Download of {} failed: {}", url, e);
                let _ = tokio::fs::remove_file(&staging).await;
                Err(e)
            }
        }
    }

    /// Runs the confirmation prompt on the blocking pool
    async fn ask(&self, message: String) -> Result<bool> {
        let confirm = self.confirm.clone();
        tokio::task::spawn_blocking(move || confirm.confirm(&message))
            .await
            .map_err(|e| Error::Internal(format!("confirmation prompt panicked: {}", e)))?
    }

    async fn download_file(&self, url: &str, path: &Path, verify_tls: bool) -> Result<u64> {
        let download = self.transport.get(url, verify_tls).await?;
        let mut file = File::create(path).await?;
        let mut body = download.body;

        let total = match download.content_length {
            Some(total) => total,
            None => {
                // Without a length there is nothing to draw a bar against
                let mut whole = BytesMut::new();
                while let Some(chunk) = body.next().await {
                    whole.extend_from_slice(&chunk?);
                }
                file.write_all(&whole).await?;
                file.flush().await?;
                return Ok(whole.len() as u64);
            }
        };

        let chunk_size = chunk_size_for(total);
        debug!(
            "Writing {} in {} chunks of {}",
            format_bytes(total),
            chunk_count(total, chunk_size as u64),
            format_bytes(chunk_size as u64)
        );
        let mut progress = DownloadProgress::new(Some(total));
        let mut pending = BytesMut::with_capacity(chunk_size);
        self.progress.start(&progress);

        while let Some(chunk) = body.next().await {
            pending.extend_from_slice(&chunk?);
            while pending.len() >= chunk_size {
                let piece = pending.split_to(chunk_size);
                self.write_chunk(&mut file, &piece, &mut progress).await?;
            }
        }
        if !pending.is_empty() {
            self.write_chunk(&mut file, &pending, &mut progress).await?;
        }

        file.flush().await?;
        self.progress.finish(&progress);

        if progress.downloaded_bytes != total {
            return Err(Error::Download(format!(
                "expected {} bytes from {}, received {}",
                total, url, progress.downloaded_bytes
            )));
        }

        Ok(progress.downloaded_bytes)
    }

    async fn write_chunk(
        &self,
        file: &mut File,
        piece: &[u8],
        progress: &mut DownloadProgress,
    ) -> Result<()> {
        file.write_all(piece).await?;
        progress.downloaded_bytes += piece.len() as u64;
        self.progress.update(progress);
        debug!(
            "Downloaded {} / {}",
            format_bytes(progress.downloaded_bytes),
            format_bytes(progress.total_bytes.unwrap_or_default())
        );
        Ok(())
    }
}

/// `<path>.part`, next to the target so the final rename stays on one filesystem
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    path.with_file_name(name)
}
