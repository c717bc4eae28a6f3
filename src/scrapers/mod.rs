//! Page scraping: the rendering service client and the site-specific scraper.
//!
//! Scraping follows a two-phase pattern:
//!
//! 1. **Indexing**: Scrape the homepage and harvest article permalinks
//! 2. **Fetching**: Scrape one article and extract its summary text
//!
//! # Modules
//!
//! | Module | Role |
//! |--------|------|
//! | [`firecrawl`] | Firecrawl REST client with scrape/crawl fallback |
//! | [`hackernews`] | Homepage indexing and article summaries for The Hacker News |
//!
//! Site logic only talks to a [`ScrapeService`], so it can be driven by a
//! canned document in tests.

pub mod firecrawl;
pub mod hackernews;

use std::future::Future;

use crate::error::Result;
use crate::models::NormalizedDocument;

/// Something that can render a URL and hand back a normalized document.
pub trait ScrapeService: Send + Sync {
    fn fetch_document(&self, url: &str) -> impl Future<Output = Result<NormalizedDocument>> + Send;
}
