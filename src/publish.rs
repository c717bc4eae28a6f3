//! WordPress publishing through the core REST API.
//!
//! Posts are created with `POST {site}/wp-json/wp/v2/posts`, authenticated
//! with an application password over basic auth. Hosts behind a WAF tend to
//! answer 403 to unknown clients, so the configured browser User-Agent is
//! always sent and a 403 gets its own error.

use reqwest::Client;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use tracing::{error, info, instrument};

use crate::error::{PipelineError, Result};
use crate::models::WordpressPost;
use crate::utils::truncate_for_log;

/// Error bodies are cut to this many bytes.
const ERROR_SNIPPET_BYTES: usize = 400;

/// A post ready to be created.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PostDraft<'a> {
    pub title: &'a str,
    pub status: &'a str,
    #[serde(rename = "content")]
    pub html: &'a str,
    pub excerpt: &'a str,
}

/// A CMS that can create posts.
pub trait CmsPublisher: Send + Sync {
    fn create_post(&self, draft: &PostDraft<'_>) -> impl Future<Output = Result<WordpressPost>> + Send;
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    #[serde(default)]
    id: u64,
    #[serde(default)]
    link: String,
    #[serde(default)]
    status: String,
}

#[derive(Clone)]
pub struct WordpressClient {
    http: Client,
    site_url: String,
    user: String,
    app_password: String,
    user_agent: String,
}

impl fmt::Debug for WordpressClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WordpressClient")
            .field("site_url", &self.site_url)
            .field("user", &self.user)
            .finish()
    }
}

impl WordpressClient {
    pub fn new(
        http: Client,
        site_url: &str,
        user: impl Into<String>,
        app_password: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            http,
            site_url: site_url.trim_end_matches('/').to_string(),
            user: user.into(),
            app_password: app_password.into(),
            user_agent: user_agent.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/wp-json/wp/v2/posts", self.site_url)
    }
}

impl CmsPublisher for WordpressClient {
    #[instrument(level = "info", skip_all, fields(site = %self.site_url, title = %draft.title))]
    async fn create_post(&self, draft: &PostDraft<'_>) -> Result<WordpressPost> {
        let res = self
            .http
            .post(self.endpoint())
            .basic_auth(&self.user, Some(&self.app_password))
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "application/json")
            .json(draft)
            .send()
            .await?;
        let status = res.status();
        let text = res.text().await?;

        if !status.is_success() {
            let snippet = truncate_for_log(&text, ERROR_SNIPPET_BYTES);
            error!(status = status.as_u16(), body = %snippet, "WordPress rejected the post");
            if status.as_u16() == 403 {
                return Err(PipelineError::Forbidden { snippet });
            }
            return Err(PipelineError::Upstream {
                service: "WP create",
                status: status.as_u16(),
                message: snippet,
            });
        }

        let created: CreatedPost = serde_json::from_str(&text)?;
        info!(id = created.id, link = %created.link, "Published WordPress post");
        Ok(WordpressPost {
            id: created.id,
            link: created.link,
            status: created.status,
        })
    }
}
