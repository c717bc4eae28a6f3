//! # Hacker News Publisher
//!
//! A small service that turns one article from The Hacker News into an
//! original long-form cybersecurity post on a WordPress site, at most once
//! per day (IST), and exposes an HTTP surface for manual runs.
//!
//! ## Features
//!
//! - Renders the homepage through Firecrawl and harvests article permalinks
//!   from every field the scrape may carry them in
//! - Summarizes the chosen article and expands it into a structured post via
//!   Groq's chat completions API
//! - Publishes through the WordPress REST API with an application password
//! - Single-flight publishing with a persisted lock and a daily guard
//!
//! ## Usage
//!
//! ```sh
//! hackernews_publisher --state-file ./publish_state.json
//! ```
//!
//! ## Architecture
//!
//! 1. **Selection**: Harvest homepage links, shortlist, pick one
//! 2. **Summary**: Scrape the article and extract its summary text
//! 3. **Expansion**: Ask the model for title, hook and HTML body
//! 4. **Publishing**: Create the post, record the outcome in the state file

use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod coordinator;
mod error;
mod links;
mod models;
mod normalize;
mod pipeline;
mod publish;
mod scheduler;
mod scrapers;
mod selector;
mod server;
mod state;
mod utils;

use cli::Cli;
use coordinator::PublishCoordinator;
use pipeline::HackerNewsPipeline;
use server::AppState;
use state::FileStateStore;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "hackernews_publisher starting up");

    let args = Arc::new(Cli::parse());
    info!(
        bind_addr = %args.bind_addr,
        state_file = %args.state_file.display(),
        schedule = !args.no_schedule,
        "Parsed configuration"
    );
    if let Err(e) = args.credentials() {
        warn!(error = %e, "Credentials incomplete; publish runs will fail until they are set");
    }

    // Early check: the state file's directory must be writable
    let store = FileStateStore::new(&args.state_file);
    let state_dir = store
        .path()
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    if let Err(e) = ensure_writable_dir(state_dir).await {
        error!(
            path = %state_dir.display(),
            error = %e,
            "State directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let http = reqwest::Client::builder()
        .user_agent(args.user_agent.as_str())
        .timeout(Duration::from_secs(args.http_timeout_secs))
        .build()?;

    let coordinator = Arc::new(PublishCoordinator::new(store));
    coordinator.clear_stale_lock().await?;
    let pipeline = Arc::new(HackerNewsPipeline::new(Arc::clone(&args), http));

    if args.no_schedule {
        info!("Daily schedule disabled");
    } else {
        tokio::spawn(scheduler::run_schedule(
            Arc::clone(&coordinator),
            Arc::clone(&pipeline),
            args.schedule_hour_ist,
            args.schedule_minute_ist,
        ));
    }

    let app = server::router(AppState {
        coordinator,
        pipeline,
    });
    let listener = TcpListener::bind(args.bind_addr).await?;
    info!(addr = %args.bind_addr, "Listening");
    axum::serve(listener, app).await?;

    Ok(())
}
