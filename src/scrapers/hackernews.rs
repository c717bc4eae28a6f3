//! The Hacker News scraper.
//!
//! The homepage is a JavaScript-heavy blog template, so it is rendered through
//! the [`ScrapeService`] rather than fetched directly. Permalinks look like
//! `https://thehackernews.com/2024/05/some-slug.html`.

use tracing::{debug, info, instrument};

use super::ScrapeService;
use crate::error::{PipelineError, Result};
use crate::links::canonical::{SITE_ROOT, title_from_url};
use crate::links::{LinkAggregator, harvest_scrape};
use crate::models::CanonicalLink;
use crate::utils::pick_first_non_empty;

/// How many homepage links a publish run considers.
pub const HARVEST_LIMIT: usize = 16;

/// Title used for an article whose page and URL yield none.
const ARTICLE_FALLBACK_TITLE: &str = "Article";

/// Summary and title of one article page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleSummary {
    pub summary_text: String,
    pub article_title: String,
}

/// Index the homepage and return up to `limit` article links, first-seen order.
#[instrument(level = "info", skip(scraper))]
pub async fn index_articles<S: ScrapeService>(
    scraper: &S,
    limit: usize,
) -> Result<Vec<CanonicalLink>> {
    let homepage = scraper.fetch_document(SITE_ROOT).await?;

    let mut aggregator = LinkAggregator::hacker_news();
    harvest_scrape(&homepage, &mut aggregator);
    let links: Vec<CanonicalLink> = aggregator.all().into_iter().take(limit).collect();

    if links.is_empty() {
        return Err(PipelineError::Validation(
            "No article links found on The Hacker News homepage".to_string(),
        ));
    }

    info!(
        count = links.len(),
        harvested = aggregator.len(),
        source = SITE_ROOT,
        "Indexed Hacker News article URLs"
    );
    debug!(urls = ?links.iter().map(|l| l.url.as_str()).collect::<Vec<_>>(), "Hacker News URLs");
    Ok(links)
}

/// Scrape one article and pull out its summary text and title.
#[instrument(level = "info", skip(scraper))]
pub async fn summarize_article<S: ScrapeService>(scraper: &S, url: &str) -> Result<ArticleSummary> {
    let article = scraper.fetch_document(url).await?;

    let summary_text = pick_first_non_empty([
        Some(article.summary.as_str()),
        Some(article.markdown.as_str()),
        Some(article.raw_text.as_str()),
    ]);
    if summary_text.is_empty() {
        return Err(PipelineError::Validation(format!(
            "Failed to extract summary from {url}"
        )));
    }

    let derived = title_from_url(url, ARTICLE_FALLBACK_TITLE);
    let article_title = pick_first_non_empty([Some(article.title.as_str()), Some(derived.as_str())]);

    info!(bytes = summary_text.len(), title = %article_title, "Parsed Hacker News article");
    Ok(ArticleSummary {
        summary_text,
        article_title,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::NormalizedDocument;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned documents by URL and records every request.
    #[derive(Default)]
    pub(crate) struct CannedScraper {
        pub docs: HashMap<String, NormalizedDocument>,
        pub requests: Mutex<Vec<String>>,
    }

    impl CannedScraper {
        pub fn with(mut self, url: &str, doc: NormalizedDocument) -> Self {
            self.docs.insert(url.to_string(), doc);
            self
        }

        pub fn requested(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl ScrapeService for CannedScraper {
        async fn fetch_document(&self, url: &str) -> Result<NormalizedDocument> {
            self.requests.lock().unwrap().push(url.to_string());
            self.docs.get(url).cloned().ok_or_else(|| PipelineError::Upstream {
                service: "Firecrawl scrape",
                status: 404,
                message: format!("no canned document for {url}"),
            })
        }
    }

    pub(crate) fn homepage_with(urls: &[&str]) -> NormalizedDocument {
        NormalizedDocument {
            links: urls.iter().map(|u| serde_json::Value::from(*u)).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_index_articles_respects_limit_and_order() {
        let urls: Vec<String> = (1..=20)
            .map(|i| format!("https://thehackernews.com/2024/05/story-{i}.html"))
            .collect();
        let refs: Vec<&str> = urls.iter().map(String::as_str).collect();
        let scraper = CannedScraper::default().with(SITE_ROOT, homepage_with(&refs));

        let links = index_articles(&scraper, HARVEST_LIMIT).await.unwrap();
        assert_eq!(links.len(), 16);
        assert_eq!(links[0].url, urls[0]);
        assert_eq!(links[15].url, urls[15]);
        assert_eq!(links[0].title, "Story 1");
        assert_eq!(scraper.requested(), vec![SITE_ROOT.to_string()]);
    }

    #[tokio::test]
    async fn test_index_articles_without_links_fails() {
        let scraper = CannedScraper::default().with(
            SITE_ROOT,
            homepage_with(&["https://thehackernews.com/search/label/Malware"]),
        );
        let err = index_articles(&scraper, HARVEST_LIMIT).await.unwrap_err();
        assert_eq!(err.to_string(), "No article links found on The Hacker News homepage");
    }

    #[tokio::test]
    async fn test_summarize_prefers_summary_then_markdown() {
        let url = "https://thehackernews.com/2024/05/patch-tuesday.html";
        let scraper = CannedScraper::default().with(
            url,
            NormalizedDocument {
                markdown: "# Markdown body".to_string(),
                ..Default::default()
            },
        );
        let summary = summarize_article(&scraper, url).await.unwrap();
        assert_eq!(summary.summary_text, "# Markdown body");
        assert_eq!(summary.article_title, "Patch Tuesday");
    }

    #[tokio::test]
    async fn test_summarize_keeps_page_title() {
        let url = "https://thehackernews.com/2024/05/patch-tuesday.html";
        let scraper = CannedScraper::default().with(
            url,
            NormalizedDocument {
                summary: "Short summary".to_string(),
                markdown: "ignored".to_string(),
                title: "Microsoft Patches 60 Flaws".to_string(),
                ..Default::default()
            },
        );
        let summary = summarize_article(&scraper, url).await.unwrap();
        assert_eq!(summary.summary_text, "Short summary");
        assert_eq!(summary.article_title, "Microsoft Patches 60 Flaws");
    }

    #[tokio::test]
    async fn test_summarize_empty_page_fails() {
        let url = "https://thehackernews.com/2024/05/empty.html";
        let scraper = CannedScraper::default().with(
            url,
            NormalizedDocument {
                html: "<div></div>".to_string(),
                ..Default::default()
            },
        );
        let err = summarize_article(&scraper, url).await.unwrap_err();
        assert_eq!(err.to_string(), format!("Failed to extract summary from {url}"));
    }
}
