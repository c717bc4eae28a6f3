//! HTTP surface: health, publish log, link preview, manual publish and reset.
//!
//! Every response is JSON carrying an `ok` flag. Failures answer
//! `{ok: false, error}` with status 500, except a held publish lock which
//! answers 409.

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::coordinator::PublishCoordinator;
use crate::error::PipelineError;
use crate::models::{PublishReason, PublishRequest};
use crate::pipeline::PublishPipeline;
use crate::state::StateStore;

/// Links returned by `GET /hackernews-links`.
pub const LINKS_LIMIT: usize = 12;

pub struct AppState<S, P> {
    pub coordinator: Arc<PublishCoordinator<S>>,
    pub pipeline: Arc<P>,
}

impl<S, P> Clone for AppState<S, P> {
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
            pipeline: Arc::clone(&self.pipeline),
        }
    }
}

pub fn router<S, P>(state: AppState<S, P>) -> Router
where
    S: StateStore + 'static,
    P: PublishPipeline + 'static,
{
    Router::new()
        .route("/healthz", get(healthz::<S, P>))
        .route("/publish-log", get(publish_log::<S, P>))
        .route("/hackernews-links", get(hackernews_links::<S, P>))
        .route("/publish-hackernews", post(publish_hackernews::<S, P>))
        .route("/publish-reset", post(publish_reset::<S, P>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn failure(e: &PipelineError) -> Response {
    let status = match e {
        PipelineError::Lock => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "ok": false, "error": e.to_string() }))).into_response()
}

async fn healthz<S, P>(State(app): State<AppState<S, P>>) -> Response
where
    S: StateStore + 'static,
    P: PublishPipeline + 'static,
{
    match app.coordinator.state().await {
        Ok(state) => Json(json!({ "ok": true, "state": state })).into_response(),
        Err(e) => failure(&e),
    }
}

async fn publish_log<S, P>(State(app): State<AppState<S, P>>) -> Response
where
    S: StateStore + 'static,
    P: PublishPipeline + 'static,
{
    match app.coordinator.state().await {
        Ok(state) => match state.last_publish_result {
            Some(record) => Json(json!({ "ok": true, "lastPublishResult": record })).into_response(),
            None => Json(json!({ "ok": true, "message": "No publish recorded yet" })).into_response(),
        },
        Err(e) => failure(&e),
    }
}

async fn hackernews_links<S, P>(State(app): State<AppState<S, P>>) -> Response
where
    S: StateStore + 'static,
    P: PublishPipeline + 'static,
{
    match app.pipeline.harvest(LINKS_LIMIT).await {
        Ok(articles) => {
            Json(json!({ "ok": true, "count": articles.len(), "articles": articles })).into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to fetch Hacker News links");
            failure(&e)
        }
    }
}

/// Read `{url?, index?, publish?}` leniently.
///
/// A missing or malformed body counts as `{}`; a non-string `url` or a
/// non-integer `index` is ignored; only an explicit `publish: false` turns
/// the run into a preview.
fn publish_request_from_body(body: &[u8]) -> PublishRequest {
    let value: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
    let url = value
        .get("url")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string);
    let index = value.get("index").and_then(integer_index);
    let publish = value.get("publish").and_then(Value::as_bool) != Some(false);

    PublishRequest {
        url,
        index,
        publish,
        reason: if publish {
            PublishReason::Manual
        } else {
            PublishReason::Preview
        },
    }
}

/// `2` and `2.0` both count; `2.5` and anything non-numeric do not.
fn integer_index(value: &Value) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    let f = value.as_f64()?;
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)
}

async fn publish_hackernews<S, P>(State(app): State<AppState<S, P>>, body: Bytes) -> Response
where
    S: StateStore + 'static,
    P: PublishPipeline + 'static,
{
    let request = publish_request_from_body(&body);
    info!(reason = %request.reason, url = ?request.url, index = ?request.index, "Manual publish requested");

    // The attempt runs on its own task: a client hanging up drops this
    // handler, never the run holding the lock.
    let coordinator = Arc::clone(&app.coordinator);
    let pipeline = Arc::clone(&app.pipeline);
    let attempt =
        tokio::spawn(async move { coordinator.publish_with_lock(pipeline.as_ref(), request).await });

    match attempt.await {
        Ok(Ok(result)) => Json(json!({ "ok": true, "result": result })).into_response(),
        Ok(Err(e)) => {
            error!(error = %e, "Manual publish failed");
            failure(&e)
        }
        Err(e) => {
            error!(error = %e, "Manual publish task did not complete");
            failure(&PipelineError::Panicked(e.to_string()))
        }
    }
}

async fn publish_reset<S, P>(State(app): State<AppState<S, P>>) -> Response
where
    S: StateStore + 'static,
    P: PublishPipeline + 'static,
{
    match app.coordinator.reset().await {
        Ok(_) => Json(json!({ "ok": true, "message": "Publish state reset" })).into_response(),
        Err(e) => failure(&e),
    }
}
