//! The publish pipeline: select, summarize, expand, publish.
//!
//! [`perform_publish`] is the whole run expressed over the three collaborator
//! traits, so it can be exercised end to end with doubles.
//! [`HackerNewsPipeline`] binds it to the real clients, building them per run
//! from the configured credentials so a missing secret fails that run instead
//! of the process.

use reqwest::Client;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

use crate::api::{AskAsync, GroqClient, RetryAsk, SourceArticle, expand_to_blog};
use crate::cli::Cli;
use crate::error::Result;
use crate::models::{CanonicalLink, PublishRequest, PublishResult};
use crate::publish::{CmsPublisher, PostDraft, WordpressClient};
use crate::scrapers::ScrapeService;
use crate::scrapers::firecrawl::FirecrawlClient;
use crate::scrapers::hackernews::{index_articles, summarize_article};
use crate::selector::select_article;

const GROQ_MAX_ATTEMPTS: usize = 3;
const GROQ_RETRY_STEP: Duration = Duration::from_secs(1);

/// What the coordinator and the HTTP layer drive.
pub trait PublishPipeline: Send + Sync {
    /// One full run; the CMS write is skipped when `request.publish` is false.
    fn run(&self, request: &PublishRequest) -> impl Future<Output = Result<PublishResult>> + Send;

    /// Homepage article links, first-seen order, at most `limit`.
    fn harvest(&self, limit: usize) -> impl Future<Output = Result<Vec<CanonicalLink>>> + Send;
}

/// Run the pipeline over the given collaborators.
#[instrument(level = "info", skip_all, fields(reason = %request.reason, publish = request.publish))]
pub async fn perform_publish<S, A, C>(
    scraper: &S,
    llm: &A,
    cms: &C,
    request: &PublishRequest,
) -> Result<PublishResult>
where
    S: ScrapeService,
    A: AskAsync<Response = String>,
    C: CmsPublisher,
{
    info!("Hacker News publish starting");
    let selected = select_article(scraper, request.url.as_deref(), request.index).await?;
    info!(title = %selected.title, url = %selected.url, "Selected article");

    let summary = summarize_article(scraper, &selected.url).await?;
    info!(chars = summary.summary_text.chars().count(), "Summary extracted");

    let post = expand_to_blog(
        llm,
        &SourceArticle {
            title: &summary.article_title,
            url: &selected.url,
            summary: &summary.summary_text,
        },
    )
    .await?;
    info!(title = %post.title, "Generated blog post");

    let wordpress_post = if request.publish {
        let created = cms
            .create_post(&PostDraft {
                title: &post.title,
                status: "publish",
                html: &post.html,
                excerpt: &post.hook,
            })
            .await?;
        info!(id = created.id, "Published WordPress post");
        Some(created)
    } else {
        info!("Preview mode: skipping WordPress publish");
        None
    };

    Ok(PublishResult {
        published: request.publish,
        source_url: selected.url,
        source_title: summary.article_title,
        generated_title: post.title,
        generated_hook: post.hook,
        wordpress_post,
    })
}

/// The production pipeline: Firecrawl, Groq and WordPress.
#[derive(Debug, Clone)]
pub struct HackerNewsPipeline {
    settings: Arc<Cli>,
    http: Client,
}

impl HackerNewsPipeline {
    pub fn new(settings: Arc<Cli>, http: Client) -> Self {
        Self { settings, http }
    }

    fn scraper(&self, api_key: String) -> FirecrawlClient {
        FirecrawlClient::new(self.http.clone(), api_key).with_base_url(&self.settings.firecrawl_base_url)
    }
}

impl PublishPipeline for HackerNewsPipeline {
    async fn run(&self, request: &PublishRequest) -> Result<PublishResult> {
        let creds = self.settings.credentials()?;
        let scraper = self.scraper(creds.firecrawl_api_key);
        let llm = RetryAsk::new(
            GroqClient::new(self.http.clone(), creds.groq_api_key, &self.settings.groq_model)
                .with_base_url(&self.settings.groq_base_url),
            GROQ_MAX_ATTEMPTS,
            GROQ_RETRY_STEP,
        );
        let cms = WordpressClient::new(
            self.http.clone(),
            &creds.wp_site_url,
            creds.wp_user,
            creds.wp_app_password,
            &self.settings.user_agent,
        );
        perform_publish(&scraper, &llm, &cms, request).await
    }

    async fn harvest(&self, limit: usize) -> Result<Vec<CanonicalLink>> {
        let creds = self.settings.credentials()?;
        index_articles(&self.scraper(creds.firecrawl_api_key), limit).await
    }
}
