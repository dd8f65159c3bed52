//! JSON Lines sink
//!
//! Writes one JSON object per line, the format accessibility tooling reads.

use crate::output::record::PageRecord;
use crate::output::stats::CrawlStats;
use crate::output::traits::{OutputResult, PageSink};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Sink that writes records as JSON Lines
pub struct JsonLinesSink {
    writer: BufWriter<File>,
}

impl JsonLinesSink {
    /// Creates (or truncates) the output file
    pub fn create(path: &Path) -> OutputResult<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl PageSink for JsonLinesSink {
    fn write_record(&mut self, record: &PageRecord) -> OutputResult<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self, _stats: &CrawlStats) -> OutputResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}
