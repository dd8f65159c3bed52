//! In-memory sink
//!
//! Keeps records in a shared vector. Clones share the same storage, so a test
//! can hand one clone to the engine and inspect the other afterwards.

use crate::output::record::PageRecord;
use crate::output::traits::{OutputError, OutputResult, PageSink};
use std::sync::{Arc, Mutex};

/// Sink that collects records in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<PageRecord>>>,
}

impl MemorySink {
    /// Creates an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every record written so far
    pub fn records(&self) -> Vec<PageRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Returns the number of records written so far
    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    /// Returns true if nothing was written
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PageSink for MemorySink {
    fn write_record(&mut self, record: &PageRecord) -> OutputResult<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| OutputError::Write(format!("Failed to lock records: {}", e)))?;
        records.push(record.clone());
        Ok(())
    }
}
