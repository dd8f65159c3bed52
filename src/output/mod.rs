//! Output module for page records
//!
//! This module handles:
//! - The page record type
//! - Handing records to a sink (SQLite, JSON Lines or memory)
//! - Crawl statistics

mod jsonl;
mod memory;
mod record;
mod sqlite_output;
pub mod stats;
mod traits;

pub use jsonl::JsonLinesSink;
pub use memory::MemorySink;
pub use record::PageRecord;
pub use sqlite_output::SqliteSink;
pub use stats::CrawlStats;
pub use traits::{OutputError, OutputResult, PageSink};

use crate::config::{OutputConfig, OutputFormat};
use crate::SpiderError;

/// File name of the SQLite record database inside the data directory
pub const SQLITE_FILE_NAME: &str = "pages.db";

/// File name of the JSON Lines output inside the data directory
pub const JSONL_FILE_NAME: &str = "pages.jsonl";

/// Hands finished page records to a sink, unchanged
pub struct RecordEmitter {
    sink: Box<dyn PageSink>,
    emitted: u64,
}

impl RecordEmitter {
    /// Creates an emitter writing to `sink`
    pub fn new(sink: Box<dyn PageSink>) -> Self {
        Self { sink, emitted: 0 }
    }

    /// Writes one record
    pub fn emit(&mut self, record: &PageRecord) -> OutputResult<()> {
        self.sink.write_record(record)?;
        self.emitted += 1;
        tracing::debug!("Recorded {} ({:?})", record.url, record.page_title);
        Ok(())
    }

    /// Number of records written so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Lets the sink finalize its output
    pub fn finish(&mut self, stats: &CrawlStats) -> OutputResult<()> {
        self.sink.finish(stats)
    }
}

/// Opens the sink selected by the output configuration
///
/// The data directory is created if needed.
///
/// # Arguments
///
/// * `config` - The output configuration
/// * `config_hash` - Hash of the configuration file, stored with SQLite runs
/// * `site` - Root URL of the crawled site
pub fn open_sink(
    config: &OutputConfig,
    config_hash: &str,
    site: &str,
) -> Result<Box<dyn PageSink>, SpiderError> {
    std::fs::create_dir_all(&config.data_dir)?;

    let sink: Box<dyn PageSink> = match config.format {
        OutputFormat::Sqlite => {
            let path = config.data_dir.join(SQLITE_FILE_NAME);
            tracing::info!("Writing page records to {}", path.display());
            Box::new(SqliteSink::open(&path, config_hash, site)?)
        }
        OutputFormat::Jsonl => {
            let path = config.data_dir.join(JSONL_FILE_NAME);
            tracing::info!("Writing page records to {}", path.display());
            Box::new(JsonLinesSink::create(&path)?)
        }
    };

    Ok(sink)
}
