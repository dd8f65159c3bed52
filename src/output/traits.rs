//! Output sink traits and errors
//!
//! This module defines the trait interface record sinks implement.

use crate::output::record::PageRecord;
use crate::output::stats::CrawlStats;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Failed to serialize record: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Destination for page records
///
/// Sinks store records unchanged; they do no filtering or deduplication of
/// their own.
pub trait PageSink {
    /// Persists a single page record
    fn write_record(&mut self, record: &PageRecord) -> OutputResult<()>;

    /// Called once when the crawl is over
    ///
    /// # Arguments
    ///
    /// * `stats` - Final statistics of the crawl
    fn finish(&mut self, stats: &CrawlStats) -> OutputResult<()> {
        let _ = stats;
        Ok(())
    }
}
