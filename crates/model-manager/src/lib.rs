//! Model acquisition for onprem
//!
//! This crate downloads model weight files into the local data directory,
//! asking for confirmation first and reporting progress while it writes.

pub mod confirm;
pub mod downloader;
pub mod progress;
pub mod reference;
pub mod transport;

// Re-export commonly used types
pub use confirm::{Confirm, FixedAnswer, TerminalConfirm};
pub use downloader::{FetchOptions, FetchOutcome, ModelFetcher};
pub use progress::{DownloadProgress, NoProgress, ProgressSink, TerminalProgress};
pub use reference::ModelReference;
pub use transport::{Download, HttpTransport, Transport};
