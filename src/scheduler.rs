//! Daily trigger at a fixed IST wall-clock time.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, instrument};

use crate::coordinator::PublishCoordinator;
use crate::models::DailyOutcome;
use crate::pipeline::PublishPipeline;
use crate::state::StateStore;
use crate::utils::IST;

/// Time from `now` until the next `hour:minute` in IST.
///
/// A target equal to `now` counts as already passed, so the result is always
/// positive. `None` when `hour:minute` is not a valid time of day.
pub fn until_next_run(now: DateTime<Utc>, hour: u32, minute: u32) -> Option<Duration> {
    let local = now.with_timezone(&IST);
    let naive = local.date_naive().and_hms_opt(hour, minute, 0)?;
    let mut target = IST.from_local_datetime(&naive).single()?;
    if target <= local {
        target += ChronoDuration::days(1);
    }
    (target - local).to_std().ok()
}

/// One scheduled firing. Errors are logged, never returned.
#[instrument(level = "info", skip_all)]
async fn fire<S, P>(coordinator: &PublishCoordinator<S>, pipeline: &P)
where
    S: StateStore,
    P: PublishPipeline,
{
    match coordinator.run_daily_publish(pipeline, false).await {
        Ok(DailyOutcome::Skipped { .. }) => info!("Daily publish skipped"),
        Ok(DailyOutcome::Ran(result)) => info!(
            title = %result.generated_title,
            source = %result.source_url,
            "Daily publish complete"
        ),
        Err(e) => error!(error = %e, "Scheduled publish failed"),
    }
}

/// Fire the daily publish at `hour:minute` IST, forever.
pub async fn run_schedule<S, P>(
    coordinator: Arc<PublishCoordinator<S>>,
    pipeline: Arc<P>,
    hour: u32,
    minute: u32,
) where
    S: StateStore,
    P: PublishPipeline,
{
    loop {
        let Some(wait) = until_next_run(Utc::now(), hour, minute) else {
            error!(hour, minute, "Invalid schedule time; daily publish disabled");
            return;
        };
        info!(
            hour,
            minute,
            wait_secs = wait.as_secs(),
            "Next daily publish scheduled (IST)"
        );
        sleep(wait).await;
        fire(&coordinator, pipeline.as_ref()).await;
    }
}
