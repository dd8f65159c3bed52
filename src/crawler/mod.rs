//! Crawler module for the authenticated crawl
//!
//! This module contains the core crawling logic, including:
//! - The crawl state machine (login handshake, re-authentication, page visits)
//! - HTTP fetching with a persistent cookie jar
//! - HTML parsing and link extraction
//! - The link policy and the frontier
//! - The engine that ties them together

mod engine;
mod fetcher;
mod parser;
mod policy;
mod request;
mod spider;

pub use engine::Engine;
pub use fetcher::{build_http_client, classify_error, user_agent, FetchFailure, Fetcher};
pub use parser::{extract_links, extract_title, parse_html, ParsedPage};
pub use policy::{Exclusion, Frontier, LinkPolicy};
pub use request::{Callback, Continuation, Method, Request, Response};
pub use spider::{Spider, SpiderOutput};

use crate::auth::CredentialSession;
use crate::config::Config;
use crate::output::{open_sink, CrawlStats};
use crate::SpiderError;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the output sink selected by the configuration
/// 2. Build the HTTP client and the crawl state machine
/// 3. Log in and crawl the course until the frontier is exhausted
/// 4. Finalize the output and return the statistics
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `config_hash` - Hash of the configuration file, stored with the run
///
/// # Returns
///
/// * `Ok(CrawlStats)` - Crawl finished (possibly halted by a login failure)
/// * `Err(SpiderError)` - The output or HTTP client could not be set up
pub async fn crawl(config: Config, config_hash: &str) -> Result<CrawlStats, SpiderError> {
    let session = CredentialSession::from_config(&config)?;
    let sink = open_sink(&config.output, config_hash, session.base_url().as_str())?;

    tracing::info!("Crawling {} as {}", session.base_url(), session.email());

    Engine::new(&config, sink)?.run().await
}
