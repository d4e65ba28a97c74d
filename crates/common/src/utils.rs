//! Utility functions for onprem
//!
//! This module provides utility functions used throughout the onprem crates.

use crate::error::{Error, Result};

/// Formats a byte size into a human-readable string
///
/// # Examples
///
/// ```
/// use common::utils::format_bytes;
///
/// assert_eq!(format_bytes(1024), "1.0 KiB");
/// assert_eq!(format_bytes(1048576), "1.0 MiB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f64 = bytes as f64;
    let base = 1024_f64;
    let exponent = (bytes_f64.ln() / base.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);

    let value = bytes_f64 / base.powi(exponent as i32);
    format!("{:.1} {}", value, UNITS[exponent])
}

/// Splits a slice into contiguous chunks of at most `chunk_size` items
///
/// The returned iterator borrows the input and yields slices lazily, so
/// calling this again simply starts over from the beginning.
///
/// # Examples
///
/// ```
/// use common::utils::split_list;
///
/// let items: Vec<u32> = (1..=10).collect();
/// let chunks: Vec<&[u32]> = split_list(&items, 3).unwrap().collect();
/// assert_eq!(chunks, vec![&[1, 2, 3][..], &[4, 5, 6], &[7, 8, 9], &[10]]);
/// ```
pub fn split_list<T>(items: &[T], chunk_size: usize) -> Result<std::slice::Chunks<'_, T>> {
    if chunk_size == 0 {
        return Err(Error::InvalidArgument("chunk size must be at least 1".to_string()));
    }
    Ok(items.chunks(chunk_size))
}

/// Iterator adapter yielding owned batches of at most `chunk_size` items
///
/// Unlike [`split_list`] this works over any iterator and never pulls more
/// than one batch from the source at a time.
pub struct ChunkSplitter<I: Iterator> {
    inner: I,
    chunk_size: usize,
}

impl<I: Iterator> ChunkSplitter<I> {
    /// Creates a new splitter over `iter`
    pub fn new<T>(iter: T, chunk_size: usize) -> Result<Self>
    where
        T: IntoIterator<IntoIter = I>,
    {
        if chunk_size == 0 {
            return Err(Error::InvalidArgument("chunk size must be at least 1".to_string()));
        }
        Ok(Self {
            inner: iter.into_iter(),
            chunk_size,
        })
    }
}

impl<I: Iterator> Iterator for ChunkSplitter<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch: Vec<I::Item> = self.inner.by_ref().take(self.chunk_size).collect();
        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }
}

/// Returns the number of chunks `len` items split into with `chunk_size`
pub fn chunk_count(len: u64, chunk_size: u64) -> u64 {
    if chunk_size == 0 {
        return 0;
    }
    len.div_ceil(chunk_size)
}
