//! One-shot and periodic refresh runs.

use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::main_lib::AppState;
use emaflow_core::errors::Result;
use emaflow_core::pipeline::{RefreshRequest, RunSummary};

/// Runs the pipeline once and logs each asset failure.
pub async fn run_once(state: &AppState, request: &RefreshRequest) -> Result<RunSummary> {
    info!("Starting refresh run...");
    let summary = state.pipeline.run(request).await?;

    for failure in summary.failures() {
        warn!(
            "Asset {} failed ({}): {}",
            failure.asset_id, failure.error_kind, failure.error
        );
    }
    Ok(summary)
}

/// Runs the pipeline every `every` until Ctrl-C. The first run starts immediately.
///
/// A run in progress always finishes; shutdown is only observed between runs.
pub async fn run_scheduled(state: Arc<AppState>, request: RefreshRequest, every: Duration) {
    info!("Refresh scheduler started ({}s interval)", every.as_secs());
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = run_once(&state, &request).await {
                    if e.is_fatal() {
                        error!("Scheduled refresh aborted: {}", e);
                    } else {
                        warn!("Scheduled refresh failed: {}", e);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested, stopping scheduler");
                break;
            }
        }
    }
}
