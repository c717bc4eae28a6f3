//! Single-flight publishing and the once-per-IST-day guard.
//!
//! The coordinator is the only owner of [`PublishState`]. Every
//! read-modify-write of the stored blob happens while holding `gate`, so two
//! attempts can never both see `isPublishing == false`. The gate is *not*
//! held while the pipeline runs; the persisted `isPublishing` flag is what
//! keeps other attempts out during that time.
//!
//! ```text
//!   Idle ──acquire──▶ Publishing ──finalize──▶ Idle
//!     ▲                   │
//!     └── Lock error ◀────┘ (second attempt, state untouched)
//! ```
//!
//! Atomicity only covers this process. Two processes sharing one state file
//! can still race; run a single instance per file.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use crate::error::{PipelineError, Result};
use crate::models::{DailyOutcome, PublishRecord, PublishRequest, PublishResult, PublishState};
use crate::pipeline::PublishPipeline;
use crate::state::StateStore;
use crate::utils::ist_date_key;

/// Source of the current time; injectable for tests.
pub type Clock = fn() -> DateTime<Utc>;

pub struct PublishCoordinator<S> {
    store: S,
    gate: Mutex<()>,
    now: Clock,
}

impl<S> std::fmt::Debug for PublishCoordinator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishCoordinator").finish_non_exhaustive()
    }
}

impl<S: StateStore> PublishCoordinator<S> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, Utc::now)
    }

    pub fn with_clock(store: S, now: Clock) -> Self {
        Self {
            store,
            gate: Mutex::new(()),
            now,
        }
    }

    async fn load(&self) -> Result<PublishState> {
        Ok(PublishState::from_blob(self.store.get().await?))
    }

    async fn save(&self, state: &PublishState) -> Result<()> {
        self.store.set(state.to_blob()?).await
    }

    /// Current state, missing fields filled from defaults.
    pub async fn state(&self) -> Result<PublishState> {
        let _gate = self.gate.lock().await;
        self.load().await
    }

    /// Overwrite the state with defaults.
    #[instrument(level = "info", skip_all)]
    pub async fn reset(&self) -> Result<PublishState> {
        let _gate = self.gate.lock().await;
        let state = PublishState::default();
        self.save(&state).await?;
        info!("Publish state reset");
        Ok(state)
    }

    /// Clear an `isPublishing` flag left behind by a process that died mid-run.
    ///
    /// Only safe at startup, before any attempt could have been made.
    /// Returns whether a stale flag was found.
    pub async fn clear_stale_lock(&self) -> Result<bool> {
        let _gate = self.gate.lock().await;
        let mut state = self.load().await?;
        if !state.is_publishing {
            return Ok(false);
        }
        warn!("Found a publish lock from a previous process; releasing it");
        state.is_publishing = false;
        self.save(&state).await?;
        Ok(true)
    }

    /// Idle -> Publishing, or `Lock` with nothing written.
    async fn acquire(&self) -> Result<()> {
        let _gate = self.gate.lock().await;
        let mut state = self.load().await?;
        if state.is_publishing {
            warn!("Publish already in progress; rejecting attempt");
            return Err(PipelineError::Lock);
        }
        state.is_publishing = true;
        self.save(&state).await
    }

    /// Publishing -> Idle, recording how the attempt went.
    ///
    /// Re-reads the stored state so a reset made while the pipeline ran is
    /// not overwritten with stale fields.
    async fn finalize(
        &self,
        request: &PublishRequest,
        outcome: &Result<PublishResult>,
    ) -> Result<()> {
        let _gate = self.gate.lock().await;
        let mut state = self.load().await?;
        let completed_at = (self.now)();

        state.is_publishing = false;
        state.last_publish_result = Some(match outcome {
            Ok(result) => PublishRecord::success(request.reason, completed_at, result.clone()),
            Err(e) => PublishRecord::failure(request.reason, completed_at, e.to_string()),
        });
        if outcome.is_ok() && request.publish {
            state.last_published_date_ist = Some(ist_date_key(completed_at));
        }
        self.save(&state).await
    }

    /// Publishing -> Idle without a record; the fallback when `finalize` fails.
    async fn release(&self) -> Result<()> {
        let _gate = self.gate.lock().await;
        let mut state = self.load().await.unwrap_or_default();
        state.is_publishing = false;
        self.save(&state).await
    }

    /// Run `pipeline` unless another attempt holds the lock.
    ///
    /// The lock is released and the attempt recorded however the pipeline
    /// ends, panics included.
    #[instrument(level = "info", skip_all, fields(reason = %request.reason, publish = request.publish))]
    pub async fn publish_with_lock<P: PublishPipeline>(
        &self,
        pipeline: &P,
        request: PublishRequest,
    ) -> Result<PublishResult> {
        self.acquire().await?;

        let outcome = match AssertUnwindSafe(pipeline.run(&request)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => Err(PipelineError::Panicked(panic_message(payload.as_ref()))),
        };

        if let Err(e) = self.finalize(&request, &outcome).await {
            error!(error = %e, "Failed to record the publish attempt; releasing the lock alone");
            if let Err(release_err) = self.release().await {
                error!(error = %release_err, "Failed to release the publish lock");
            }
            if outcome.is_ok() {
                return Err(e);
            }
        }

        match &outcome {
            Ok(result) => info!(
                published = result.published,
                title = %result.generated_title,
                "Publish attempt succeeded"
            ),
            Err(e) => error!(error = %e, "Publish attempt failed"),
        }
        outcome
    }

    /// The scheduled trigger: publish at most once per IST calendar day.
    ///
    /// When today's date is already recorded and `force` is false the lock is
    /// never touched and `{skipped: true}` comes back.
    #[instrument(level = "info", skip_all, fields(force = force))]
    pub async fn run_daily_publish<P: PublishPipeline>(
        &self,
        pipeline: &P,
        force: bool,
    ) -> Result<DailyOutcome> {
        let today = ist_date_key((self.now)());
        if !force {
            let state = self.state().await?;
            if state.last_published_date_ist.as_deref() == Some(today.as_str()) {
                info!(%today, "Already published today; skipping");
                return Ok(DailyOutcome::skipped());
            }
        }
        self.publish_with_lock(pipeline, PublishRequest::scheduled())
            .await
            .map(DailyOutcome::Ran)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
