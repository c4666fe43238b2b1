use chrono::{Local, NaiveTime};
use tokio::time::{sleep, Duration};
use tracing::{error, info};

use crate::state::AppState;

/// Time from `now` until the next `at`, wrapping to tomorrow once `at` has passed
pub fn until_next(now: NaiveTime, at: NaiveTime) -> Duration {
    let delta = at.signed_duration_since(now);
    let delta = if delta <= chrono::Duration::zero() {
        delta + chrono::Duration::days(1)
    } else {
        delta
    };
    delta.to_std().unwrap_or_default()
}

/// Run fulfillment every day at `at` until shutdown
pub async fn start_fulfillment_scheduler(state: AppState, at: NaiveTime) {
    info!(%at, "Fulfillment scheduler started");

    loop {
        let wait = until_next(Local::now().time(), at);
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                info!("Fulfillment scheduler stopped");
                return;
            }
            _ = sleep(wait) => {}
        }

        let dry_run = state.settings.dry_run_default;
        match state.run_fulfillment(dry_run).await {
            Ok(report) => info!(
                succeeded = report.succeeded,
                failed = report.failed,
                dry_run,
                "Scheduled fulfillment finished"
            ),
            Err(e) => error!("Scheduled fulfillment failed: {}", e),
        }
    }
}
