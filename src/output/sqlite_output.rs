//! SQLite sink implementation
//!
//! Every crawl gets a row in `runs`; its page records go to `pages`.

use crate::output::record::PageRecord;
use crate::output::stats::CrawlStats;
use crate::output::traits::{OutputError, OutputResult, PageSink};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::path::Path;

/// SQL schema for the record database
pub const SCHEMA_SQL: &str = r#"
-- One row per crawl
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    site TEXT NOT NULL,
    pages_recorded INTEGER NOT NULL DEFAULT 0,
    reauthentications INTEGER NOT NULL DEFAULT 0,
    failures INTEGER NOT NULL DEFAULT 0,
    final_phase TEXT
);

-- Visited pages
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    page_title TEXT,
    accessed_at TEXT NOT NULL,
    request_headers TEXT NOT NULL,
    UNIQUE(run_id, url)
);

CREATE INDEX IF NOT EXISTS idx_pages_run ON pages(run_id);
"#;

/// SQLite-based page sink
pub struct SqliteSink {
    conn: Connection,
    run_id: i64,
}

impl SqliteSink {
    /// Opens (or creates) the database and starts a new run
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `config_hash` - Hash of the configuration the crawl runs with
    /// * `site` - Root URL of the crawled site
    pub fn open(path: &Path, config_hash: &str, site: &str) -> OutputResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;
        Self::start(conn, config_hash, site)
    }

    /// Creates an in-memory database (for testing)
    pub fn open_in_memory(config_hash: &str, site: &str) -> OutputResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::start(conn, config_hash, site)
    }

    fn start(conn: Connection, config_hash: &str, site: &str) -> OutputResult<Self> {
        conn.execute_batch(SCHEMA_SQL)?;
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, site) VALUES (?1, ?2, ?3)",
            params![Utc::now().to_rfc3339(), config_hash, site],
        )?;
        let run_id = conn.last_insert_rowid();
        tracing::debug!("Started run {} in record database", run_id);
        Ok(Self { conn, run_id })
    }

    /// ID of the run this sink writes to
    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Counts the pages recorded for a run
    pub fn count_pages(&self, run_id: i64) -> OutputResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Loads the pages recorded for a run, in insertion order
    pub fn load_pages(&self, run_id: i64) -> OutputResult<Vec<PageRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT url, page_title, accessed_at, request_headers FROM pages WHERE run_id = ?1 ORDER BY id",
        )?;

        let rows = stmt.query_map(params![run_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (url, page_title, accessed_at, headers) = row?;
            let accessed_at = accessed_at
                .parse::<DateTime<Utc>>()
                .map_err(|e| OutputError::Write(format!("Bad timestamp for {}: {}", url, e)))?;
            let request_headers: BTreeMap<String, String> = serde_json::from_str(&headers)?;
            records.push(PageRecord {
                url,
                request_headers,
                accessed_at,
                page_title,
            });
        }

        Ok(records)
    }
}

impl PageSink for SqliteSink {
    fn write_record(&mut self, record: &PageRecord) -> OutputResult<()> {
        let headers = serde_json::to_string(&record.request_headers)?;
        self.conn.execute(
            "INSERT INTO pages (run_id, url, page_title, accessed_at, request_headers)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.run_id,
                record.url,
                record.page_title,
                record.accessed_at.to_rfc3339(),
                headers
            ],
        )?;
        Ok(())
    }

    fn finish(&mut self, stats: &CrawlStats) -> OutputResult<()> {
        self.conn.execute(
            "UPDATE runs SET finished_at = ?1, pages_recorded = ?2, reauthentications = ?3,
             failures = ?4, final_phase = ?5 WHERE id = ?6",
            params![
                Utc::now().to_rfc3339(),
                stats.pages_recorded as i64,
                stats.reauthentications as i64,
                stats.total_failures() as i64,
                stats.final_phase.map(|phase| phase.as_str()),
                self.run_id
            ],
        )?;
        Ok(())
    }
}
