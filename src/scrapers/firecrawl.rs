//! Firecrawl client: direct scrape, crawl jobs and the fallback between them.
//!
//! Firecrawl renders pages in a real browser, which The Hacker News needs for
//! its front page. A direct `/scrape` is tried first; when it comes back empty
//! or fails, a one-page `/crawl` job is started and polled until it finishes.
//! A scrape refused as "not permitted" is final: crawling the same URL would
//! be refused too.

use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument, warn};

use super::ScrapeService;
use crate::error::{PipelineError, Result};
use crate::models::NormalizedDocument;
use crate::normalize::{normalize, resolve_alias};
use crate::utils::truncate_for_log;

pub const FIRECRAWL_BASE: &str = "https://api.firecrawl.dev/v1";

/// Representations requested for every page.
pub const DEFAULT_FORMATS: &[&str] = &["summary", "html", "links"];

const POLL_TIMEOUT: Duration = Duration::from_millis(45_000);
const POLL_INTERVAL: Duration = Duration::from_millis(1_500);

/// Upstream error bodies are cut to this many bytes in error messages.
const ERROR_SNIPPET_BYTES: usize = 400;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: &'a [&'a str],
    only_main_content: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeOptions<'a> {
    formats: &'a [&'a str],
    only_main_content: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CrawlRequest<'a> {
    url: &'a str,
    limit: u32,
    crawl_entire_domain: bool,
    scrape_options: ScrapeOptions<'a>,
}

#[derive(Clone)]
pub struct FirecrawlClient {
    http: Client,
    api_key: String,
    base_url: String,
    poll_timeout: Duration,
    poll_interval: Duration,
}

impl std::fmt::Debug for FirecrawlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirecrawlClient")
            .field("base_url", &self.base_url)
            .field("poll_timeout", &self.poll_timeout)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl FirecrawlClient {
    pub fn new(http: Client, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: FIRECRAWL_BASE.to_string(),
            poll_timeout: POLL_TIMEOUT,
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Send an authenticated request and decode the JSON body.
    async fn send_json(&self, request: RequestBuilder, service: &'static str) -> Result<Value> {
        let res = request.bearer_auth(&self.api_key).send().await?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(PipelineError::Upstream {
                service,
                status: status.as_u16(),
                message: truncate_for_log(&text, ERROR_SNIPPET_BYTES),
            });
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Scrape one URL directly.
    #[instrument(level = "info", skip(self, formats))]
    pub async fn scrape(&self, url: &str, formats: &[&str]) -> Result<NormalizedDocument> {
        let body = ScrapeRequest {
            url,
            formats,
            only_main_content: false,
        };
        let json = self
            .send_json(
                self.http.post(format!("{}/scrape", self.base_url)).json(&body),
                "Firecrawl scrape",
            )
            .await?;
        if let Some(message) = reported_error(&json) {
            return Err(PipelineError::Rejected {
                service: "Firecrawl scrape",
                message,
            });
        }

        let doc = normalize(&json);
        info!(
            docs = doc.documents.len(),
            links = doc.links.len(),
            "Firecrawl scrape complete"
        );
        Ok(doc)
    }

    /// Start a single-page crawl job and return Firecrawl's raw answer.
    #[instrument(level = "info", skip(self))]
    pub async fn start_crawl(&self, url: &str) -> Result<Value> {
        let body = CrawlRequest {
            url,
            limit: 1,
            crawl_entire_domain: false,
            scrape_options: ScrapeOptions {
                formats: DEFAULT_FORMATS,
                only_main_content: false,
            },
        };
        self.send_json(
            self.http.post(format!("{}/crawl", self.base_url)).json(&body),
            "Firecrawl crawl start",
        )
        .await
    }

    /// Poll a crawl job until it reports completion or the budget runs out.
    #[instrument(level = "info", skip(self))]
    pub async fn poll_crawl(&self, job_id: &str) -> Result<Value> {
        let started = Instant::now();
        let endpoint = format!("{}/crawl/{}", self.base_url, urlencoding::encode(job_id));
        let mut attempts = 0u32;

        while started.elapsed() < self.poll_timeout {
            attempts += 1;
            let json = self
                .send_json(self.http.get(&endpoint), "Firecrawl poll")
                .await?;
            if crawl_finished(&json) {
                info!(attempts, "Firecrawl crawl finished");
                return Ok(json);
            }
            let status = json.get("status").and_then(Value::as_str).unwrap_or("unknown");
            if CRAWL_FAILED_STATES.contains(&status) {
                return Err(PipelineError::Rejected {
                    service: "Firecrawl poll",
                    message: format!("crawl job {job_id} ended with status {status}"),
                });
            }
            debug!(attempts, status, "Crawl still in progress");
            sleep(self.poll_interval).await;
        }

        Err(PipelineError::Timeout("Firecrawl poll".to_string()))
    }

    /// Scrape `url`, falling back to a crawl job when the scrape is unusable.
    #[instrument(level = "info", skip(self))]
    pub async fn scrape_with_fallback(&self, url: &str) -> Result<NormalizedDocument> {
        match self.scrape(url, DEFAULT_FORMATS).await {
            Ok(doc) if doc.has_content() => {
                info!("Using direct scrape");
                return Ok(doc);
            }
            Ok(_) => warn!("Scrape returned no usable content; falling back to crawl"),
            Err(e) if e.to_string().to_lowercase().contains("not permitted") => return Err(e),
            Err(e) => warn!(error = %e, "Scrape failed; falling back to crawl"),
        }

        let started = self.start_crawl(url).await?;
        let has_data = started
            .get("data")
            .and_then(Value::as_array)
            .is_some_and(|data| !data.is_empty());
        if has_data {
            info!("Using immediate crawl data");
            return Ok(normalize(&started));
        }

        let job_id = started
            .as_object()
            .map(|obj| resolve_alias(&[obj], &["id", "jobId", "crawlId"]))
            .unwrap_or_default();
        if job_id.is_empty() {
            return Err(PipelineError::Rejected {
                service: "Firecrawl crawl",
                message: "did not return data or a job id".to_string(),
            });
        }

        let polled = self.poll_crawl(&job_id).await?;
        info!("Using polled crawl data");
        Ok(normalize(&polled))
    }
}

impl ScrapeService for FirecrawlClient {
    async fn fetch_document(&self, url: &str) -> Result<NormalizedDocument> {
        self.scrape_with_fallback(url).await
    }
}

/// The `error` field of a 2xx body, when it carries anything.
fn reported_error(json: &Value) -> Option<String> {
    match json.get("error")? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Poll statuses after which the job will never complete.
const CRAWL_FAILED_STATES: &[&str] = &["failed", "cancelled"];

/// Whether a poll answer is final.
fn crawl_finished(json: &Value) -> bool {
    json.get("status").and_then(Value::as_str) == Some("completed")
        || json.get("success").and_then(Value::as_bool) == Some(true)
        || json.get("data").is_some_and(Value::is_array)
        || json.get("documents").is_some_and(Value::is_array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> FirecrawlClient {
        FirecrawlClient::new(Client::new(), "fc-test")
            .with_base_url(format!("{}/v1", server.uri()))
            .with_poll_interval(Duration::from_millis(10))
            .with_poll_timeout(Duration::from_millis(500))
    }

    #[tokio::test]
    async fn test_direct_scrape_is_used_when_it_has_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/scrape"))
            .and(header("authorization", "Bearer fc-test"))
            .and(body_partial_json(json!({
                "url": "https://thehackernews.com/",
                "formats": ["summary", "html", "links"],
                "onlyMainContent": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": { "summary": "front page", "links": ["a", "b"] }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/crawl"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let doc = client(&server)
            .scrape_with_fallback("https://thehackernews.com/")
            .await
            .unwrap();
        assert_eq!(doc.summary, "front page");
        assert_eq!(doc.links.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_scrape_falls_back_to_polled_crawl() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/scrape"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true, "data": {} })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/crawl"))
            .and(body_partial_json(json!({ "limit": 1, "crawlEntireDomain": false })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "jobId": "job-7" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/crawl/job-7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "completed",
                "data": [{ "markdown": "crawled body" }]
            })))
            .mount(&server)
            .await;

        let doc = client(&server)
            .scrape_with_fallback("https://thehackernews.com/")
            .await
            .unwrap();
        assert_eq!(doc.markdown, "crawled body");
    }

    #[tokio::test]
    async fn test_immediate_crawl_data_skips_polling() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/scrape"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/crawl"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "html": "<p>now</p>" }]
            })))
            .mount(&server)
            .await;

        let doc = client(&server)
            .scrape_with_fallback("https://thehackernews.com/")
            .await
            .unwrap();
        assert_eq!(doc.html, "<p>now</p>");
    }

    #[tokio::test]
    async fn test_not_permitted_is_not_retried_as_crawl() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/scrape"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_string(r#"{"error":"This website is no longer supported, scraping is not permitted"}"#),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/crawl"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client(&server)
            .scrape_with_fallback("https://thehackernews.com/")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Upstream { status: 403, .. }));
    }

    #[tokio::test]
    async fn test_reported_error_in_success_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/scrape"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": "quota exceeded" })))
            .mount(&server)
            .await;

        let err = client(&server)
            .scrape("https://thehackernews.com/", DEFAULT_FORMATS)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Firecrawl scrape rejected the request: quota exceeded");
    }

    #[tokio::test]
    async fn test_poll_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/crawl/slow"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "scraping",
                "completed": 0,
                "total": 1
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .with_poll_timeout(Duration::from_millis(60))
            .poll_crawl("slow")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Timeout(_)));
        assert_eq!(err.to_string(), "Firecrawl poll timed out");
    }

    #[tokio::test]
    async fn test_failed_crawl_stops_polling() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/crawl/doomed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "failed" })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server)
            .with_poll_timeout(Duration::from_secs(30))
            .poll_crawl("doomed")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Rejected { service: "Firecrawl poll", .. }));
        assert_eq!(
            err.to_string(),
            "Firecrawl poll rejected the request: crawl job doomed ended with status failed"
        );
    }

    #[tokio::test]
    async fn test_crawl_without_job_id_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/scrape"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/crawl"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": false })))
            .mount(&server)
            .await;

        let err = client(&server)
            .scrape_with_fallback("https://thehackernews.com/")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Rejected { .. }));
    }

    #[test]
    fn test_crawl_finished_signals() {
        assert!(crawl_finished(&json!({ "status": "completed" })));
        assert!(crawl_finished(&json!({ "documents": [] })));
        assert!(!crawl_finished(&json!({ "status": "scraping", "success": false })));
    }
}
