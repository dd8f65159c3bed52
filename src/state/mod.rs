//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlPhase`: where the crawl is in its login / crawl / re-authentication cycle

mod phase;

pub use phase::CrawlPhase;
