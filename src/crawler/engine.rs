//! Fetch engine
//!
//! Drives the spider: dispatches its requests with bounded concurrency, feeds
//! responses and failures back to it, records pages and follows their links
//! through the link policy. All crawl state lives in the engine's event loop,
//! so the frontier needs no locking.

use crate::auth::{AuthError, CredentialSession};
use crate::config::Config;
use crate::crawler::fetcher::{FetchFailure, Fetcher};
use crate::crawler::parser::extract_links;
use crate::crawler::policy::{Frontier, LinkPolicy};
use crate::crawler::request::{Callback, Request, Response};
use crate::crawler::spider::{Spider, SpiderOutput};
use crate::output::{CrawlStats, PageRecord, PageSink, RecordEmitter};
use crate::SpiderError;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

type FetchOutcome = (Request, Result<Response, FetchFailure>);

/// Event-driven crawl engine
pub struct Engine {
    spider: Spider,
    fetcher: Fetcher,
    policy: LinkPolicy,
    frontier: Frontier,
    emitter: RecordEmitter,
    stats: CrawlStats,
    queue: VecDeque<Request>,
    max_in_flight: usize,
    download_delay: Duration,
}

impl Engine {
    /// Creates an engine that writes page records to `sink`
    pub fn new(config: &Config, sink: Box<dyn PageSink>) -> Result<Self, SpiderError> {
        let session = CredentialSession::from_config(config)?;
        let fetcher = Fetcher::new(
            &config.user_agent,
            &config.crawler,
            session.basic_auth().cloned(),
        )?;
        let policy = LinkPolicy::new(session.site_host());

        Ok(Self {
            spider: Spider::new(session, config.crawler.max_reauth_attempts),
            fetcher,
            policy,
            frontier: Frontier::new(),
            emitter: RecordEmitter::new(sink),
            stats: CrawlStats::new(),
            queue: VecDeque::new(),
            max_in_flight: config.crawler.max_concurrent_requests.max(1) as usize,
            download_delay: Duration::from_millis(config.crawler.download_delay),
        })
    }

    /// The crawl state machine
    pub fn spider(&self) -> &Spider {
        &self.spider
    }

    /// URLs enqueued or visited so far
    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    /// Requests waiting for dispatch
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Runs the crawl until no request is queued or in flight
    ///
    /// Missing credentials are not an error: the crawl never starts and the
    /// returned statistics show zero requests.
    pub async fn run(mut self) -> Result<CrawlStats, SpiderError> {
        let initial = match self.spider.begin() {
            Ok(requests) => requests,
            Err(SpiderError::Auth(AuthError::MissingCredentials)) => {
                tracing::error!("Please enter a valid email/password combination, nothing to crawl");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        for request in initial {
            self.schedule(request);
        }

        let mut in_flight: JoinSet<FetchOutcome> = JoinSet::new();
        let mut last_dispatch: Option<Instant> = None;

        loop {
            while in_flight.len() < self.max_in_flight && !self.spider.is_halted() {
                let Some(request) = self.queue.pop_front() else {
                    break;
                };

                if let Some(last) = last_dispatch {
                    let elapsed = last.elapsed();
                    if elapsed < self.download_delay {
                        tokio::time::sleep(self.download_delay - elapsed).await;
                    }
                }
                last_dispatch = Some(Instant::now());

                self.stats.requests_sent += 1;
                let fetcher = self.fetcher.clone();
                in_flight.spawn(async move {
                    let result = fetcher.fetch(&request).await;
                    (request, result)
                });
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };

            match joined {
                Ok((request, result)) => self.handle_outcome(request, result)?,
                Err(e) => tracing::error!("Fetch task failed: {}", e),
            }
        }

        if self.spider.is_halted() && !self.queue.is_empty() {
            tracing::warn!(
                "Crawl halted with {} requests still queued",
                self.queue.len()
            );
        }

        self.stats.final_phase = Some(self.spider.phase());
        self.stats.reauthentications = self.spider.reauthentications();
        self.emitter.finish(&self.stats)?;
        self.stats.log_summary();

        Ok(self.stats)
    }

    /// Queues a request unless the crawl is halted or the URL is already known
    fn schedule(&mut self, request: Request) {
        if self.spider.is_halted() {
            tracing::debug!("Crawl halted, dropping request for {}", request.url);
            return;
        }

        let fresh = self.frontier.insert_if_absent(request.url.as_str());
        if !fresh && !request.dont_filter {
            tracing::trace!("Already seen {}", request.url);
            return;
        }

        self.queue.push_back(request);
    }

    fn handle_outcome(
        &mut self,
        request: Request,
        result: Result<Response, FetchFailure>,
    ) -> Result<(), SpiderError> {
        let response = match result {
            Ok(response) => response,
            Err(failure) => {
                match &failure {
                    FetchFailure::Http { .. } => self.stats.http_failures += 1,
                    FetchFailure::NameResolution { .. } => self.stats.dns_failures += 1,
                    FetchFailure::Other { .. } => self.stats.other_failures += 1,
                }
                self.spider.handle_failure(&request, &failure);
                return Ok(());
            }
        };

        let outputs = match self.spider.handle_response(&request.callback, &response) {
            Ok(outputs) => outputs,
            Err(e) => {
                tracing::error!("{}", e);
                return Ok(());
            }
        };

        for output in outputs {
            match output {
                SpiderOutput::Request(next) => self.schedule(next),
                SpiderOutput::Record(record) => self.record_page(&request, &response, record)?,
            }
        }

        Ok(())
    }

    /// Emits a page record once per URL and follows the page's links
    fn record_page(
        &mut self,
        request: &Request,
        response: &Response,
        record: PageRecord,
    ) -> Result<(), SpiderError> {
        if !self.frontier.mark_visited(&record.url) {
            tracing::debug!("Already recorded {}, skipping", record.url);
            self.stats.duplicate_pages += 1;
            return Ok(());
        }

        if request.callback == Callback::Visit {
            self.frontier.mark_visited(request.url.as_str());
        }

        self.emitter.emit(&record)?;
        self.stats.pages_recorded += 1;

        let links = extract_links(&response.body, &response.url);
        let (selected, excluded) = self.policy.select(&links, &self.frontier);
        self.stats.links_excluded += excluded;

        tracing::debug!(
            "{}: {} links to follow, {} excluded",
            record.url,
            selected.len(),
            excluded
        );

        for url in selected {
            self.schedule(Request::get(url, Callback::Visit));
        }

        Ok(())
    }
}
