//! LLM interaction: turning an article summary into a blog post.
//!
//! The model is reached through Groq's OpenAI-compatible chat completions
//! endpoint. The module keeps a small trait-based layering:
//!
//! - [`AskAsync`]: core trait, one prompt in, one reply out
//! - [`GroqClient`]: the HTTP implementation
//! - [`RetryAsk`]: decorator that retries server-side failures
//! - [`expand_to_blog`]: prompt construction plus reply parsing
//!
//! # Retry Strategy
//!
//! - At most 3 attempts in total
//! - Linear backoff: `step × attempt` (1s, then 2s)
//! - Only 5xx answers are retried; anything else fails the run immediately

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use crate::error::{PipelineError, Result};
use crate::normalize::resolve_alias;
use crate::utils::{looks_truncated, pick_first_non_empty, truncate_chars, truncate_for_log};

pub const GROQ_BASE: &str = "https://api.groq.com/openai/v1";

const TEMPERATURE: f64 = 0.3;

/// Generated titles are cut to this many characters.
const MAX_TITLE_CHARS: usize = 120;

/// Error bodies are cut to this many bytes.
const ERROR_SNIPPET_BYTES: usize = 300;

static OPENING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```[a-zA-Z]*\n?").unwrap());

const SYSTEM_PROMPT: &str = r#"You are a security analyst and technical writer.
Write a precise, well-structured cybersecurity blog post in valid HTML based on a source summary.
Sections:
<h2>TLDR</h2> two lines
<h2>What happened</h2>
<h2>Why it matters</h2>
<h2>Who is affected</h2>
<h2>How to check exposure</h2>
<h2>Fast mitigation</h2>
Rules: produce 2500 to 3000 words, short sentences, confident tone, no hype, and do not include a References heading.
Return compact JSON (single line, no code fences) with keys: "title" (an original headline, not copied from the source), "hook" (25 to 40 word teaser written by you), and "html" (the article body wrapped in HTML)."#;

/// A system + user message pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPrompt {
    pub system: String,
    pub user: String,
}

/// The article the post is written from.
#[derive(Debug, Clone, Copy)]
pub struct SourceArticle<'a> {
    pub title: &'a str,
    pub url: &'a str,
    pub summary: &'a str,
}

/// A blog post as produced by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedPost {
    pub title: String,
    pub hook: String,
    pub html: String,
}

/// Trait for async LLM interaction.
///
/// Implementors send one prompt and hand back the model's reply. This is the
/// seam decorators like [`RetryAsk`] and test doubles plug into.
pub trait AskAsync: Send + Sync {
    type Response: Send;

    fn ask(&self, prompt: &ChatPrompt) -> impl Future<Output = Result<Self::Response>> + Send;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f64,
}

#[derive(Debug, Default, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatReply>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Groq chat completions client.
#[derive(Clone)]
pub struct GroqClient {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl fmt::Debug for GroqClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroqClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GroqClient {
    pub fn new(http: Client, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
            base_url: GROQ_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

impl AskAsync for GroqClient {
    type Response = String;

    #[instrument(level = "info", skip_all, fields(model = %self.model))]
    async fn ask(&self, prompt: &ChatPrompt) -> Result<String> {
        let t0 = Instant::now();
        let payload = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: TEMPERATURE,
        };

        let res = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;
        let status = res.status();
        let text = res.text().await?;

        if !status.is_success() {
            let snippet = truncate_for_log(&text, ERROR_SNIPPET_BYTES);
            warn!(
                status = status.as_u16(),
                elapsed_ms = t0.elapsed().as_millis() as u128,
                "Groq call failed"
            );
            if status.as_u16() == 400 && text.to_lowercase().contains("model_decommissioned") {
                return Err(PipelineError::ModelDecommissioned {
                    model: self.model.clone(),
                    snippet,
                });
            }
            return Err(PipelineError::Upstream {
                service: "Groq",
                status: status.as_u16(),
                message: snippet,
            });
        }

        let completion: ChatCompletion = serde_json::from_str(&text)?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|reply| reply.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();
        if content.is_empty() {
            return Err(PipelineError::Validation(
                "Groq returned empty content".to_string(),
            ));
        }

        info!(
            bytes = content.len(),
            elapsed_ms = t0.elapsed().as_millis() as u128,
            "Groq call succeeded"
        );
        Ok(content)
    }
}

/// Wrapper that retries server-side failures of any [`AskAsync`] implementation.
///
/// The delay before attempt `n + 1` is `step × n`. Client errors, parse
/// errors and transport errors are returned on the spot.
pub struct RetryAsk<T> {
    inner: T,
    max_attempts: usize,
    step: Duration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Wrap `inner`, allowing `max_attempts` calls in total.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let groq = GroqClient::new(http, api_key, "openai/gpt-oss-120b");
    /// let llm = RetryAsk::new(groq, 3, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_attempts: usize, step: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            step,
        }
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_attempts", &self.max_attempts)
            .field("step", &self.step)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, prompt: &ChatPrompt) -> Result<Self::Response> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            let e = match self.inner.ask(prompt).await {
                Ok(resp) => return Ok(resp),
                Err(e) => e,
            };

            if !e.is_server_error() || attempt >= self.max_attempts {
                error!(
                    attempt,
                    max = self.max_attempts,
                    elapsed_ms_total = total_t0.elapsed().as_millis() as u128,
                    error = %e,
                    "ask() giving up"
                );
                return Err(e);
            }

            let delay = self.step.saturating_mul(attempt as u32);
            warn!(
                attempt,
                max = self.max_attempts,
                ?delay,
                error = %e,
                "ask() attempt failed; backing off"
            );
            sleep(delay).await;
        }
    }
}

/// Build the system and user messages for one article.
pub fn blog_prompt(source: &SourceArticle<'_>) -> ChatPrompt {
    ChatPrompt {
        system: SYSTEM_PROMPT.to_string(),
        user: format!(
            "Source title: {}\nSource url: {}\n\nSource summary:\n{}\n\nWrite the post now in clean HTML. Use h2 for section headings and lists where useful.",
            source.title, source.url, source.summary
        ),
    }
}

/// Drop a surrounding markdown code fence, if any.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let body = match OPENING_FENCE.find(trimmed) {
        Some(m) => &trimmed[m.end()..],
        None => trimmed,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Decode the model's reply, tolerating fences and prose around the object.
fn parse_reply_json(content: &str) -> Result<Value> {
    let body = strip_code_fence(content);
    match serde_json::from_str::<Value>(body) {
        Ok(value) => Ok(value),
        Err(e) => {
            let first = body.find('{');
            let last = body.rfind('}');
            match (first, last) {
                (Some(first), Some(last)) if last > first => {
                    Ok(serde_json::from_str(&body[first..=last])?)
                }
                _ if looks_truncated(&e) => Err(PipelineError::Validation(format!(
                    "Groq response not JSON (truncated): {}",
                    truncate_for_log(body, ERROR_SNIPPET_BYTES)
                ))),
                _ => Err(PipelineError::Validation(format!(
                    "Groq response not JSON: {}",
                    truncate_for_log(body, ERROR_SNIPPET_BYTES)
                ))),
            }
        }
    }
}

/// Turn the model's reply into a post.
///
/// Title falls back to `source_title` and is capped at 120 characters. Hook
/// and HTML have no fallback; a reply missing either is rejected.
pub fn parse_generated_post(content: &str, source_title: &str) -> Result<GeneratedPost> {
    let parsed = parse_reply_json(content)?;
    let empty = Map::new();
    let object = parsed.as_object().unwrap_or(&empty);

    let model_title = resolve_alias(&[object], &["title", "headline"]);
    let title = truncate_chars(
        &pick_first_non_empty([Some(model_title.as_str()), Some(source_title)]),
        MAX_TITLE_CHARS,
    );
    let hook = resolve_alias(&[object], &["hook", "description", "preview"]);
    let html = resolve_alias(&[object], &["html", "body", "content"]);

    for (field, value) in [("title", &title), ("hook", &hook), ("html", &html)] {
        if value.is_empty() {
            return Err(PipelineError::Validation(format!("Groq JSON missing {field}")));
        }
    }

    Ok(GeneratedPost { title, hook, html })
}

/// Ask the model to expand `source` into a full post.
#[instrument(level = "info", skip_all, fields(source_url = %source.url))]
pub async fn expand_to_blog<A>(llm: &A, source: &SourceArticle<'_>) -> Result<GeneratedPost>
where
    A: AskAsync<Response = String>,
{
    let t0 = Instant::now();
    let prompt = blog_prompt(source);
    let res = match llm.ask(&prompt).await {
        Ok(content) => parse_generated_post(&content, source.title),
        Err(e) => Err(e),
    };

    match &res {
        Ok(post) => info!(
            elapsed_ms_total = t0.elapsed().as_millis() as u128,
            title = %post.title,
            html_bytes = post.html.len(),
            "expand_to_blog succeeded"
        ),
        Err(e) => {
            error!(elapsed_ms_total = t0.elapsed().as_millis() as u128, error = %e, "expand_to_blog failed")
        }
    }
    res
}
