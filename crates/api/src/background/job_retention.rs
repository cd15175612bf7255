//! Periodic job sweep: fails stuck jobs and evicts finished ones.
//!
//! Two passes per tick over the in-memory store:
//! - watchdog: any non-terminal job idle for longer than the timeout is
//!   moved to `failed` with [`TIMEOUT_MESSAGE`];
//! - retention: terminal jobs older than the retention period are removed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use kura_core::types::{JobId, Timestamp};
use kura_pipeline::store::JobStore;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;

/// Error recorded on jobs failed by the watchdog.
pub const TIMEOUT_MESSAGE: &str = "Job timed out";

/// Sweep interval bounds.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionSettings {
    pub job_timeout: Duration,
    pub retention: Duration,
    pub interval: Duration,
}

impl RetentionSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            job_timeout: Duration::from_secs(config.job_timeout_secs),
            retention: Duration::from_secs(config.job_retention_secs),
            interval: Duration::from_secs(config.job_sweep_interval_secs),
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub timed_out: Vec<JobId>,
    pub evicted: usize,
}

/// Run the sweep loop until `cancel` is triggered.
pub async fn run(store: Arc<JobStore>, settings: RetentionSettings, cancel: CancellationToken) {
    let period = sweep_period(settings.interval);

    tracing::info!(
        timeout_secs = settings.job_timeout.as_secs(),
        retention_secs = settings.retention.as_secs(),
        interval_secs = period.as_secs(),
        "Job retention task started"
    );

    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job retention task stopping");
                break;
            }
            _ = interval.tick() => {
                let report = sweep_once(&store, &settings).await;
                if report.timed_out.is_empty() && report.evicted == 0 {
                    tracing::debug!("Job retention: nothing to do");
                } else {
                    let remaining = store.len().await;
                    tracing::info!(
                        timed_out = report.timed_out.len(),
                        evicted = report.evicted,
                        remaining = remaining,
                        "Job retention: sweep finished"
                    );
                }
            }
        }
    }
}

/// Apply the watchdog and the retention pass once.
pub async fn sweep_once(store: &JobStore, settings: &RetentionSettings) -> SweepReport {
    let timed_out = store
        .fail_stale(cutoff(settings.job_timeout), TIMEOUT_MESSAGE)
        .await;
    for id in &timed_out {
        tracing::warn!(job_id = %id, "Job timed out");
    }

    let evicted = store.evict_finished(cutoff(settings.retention)).await;

    SweepReport { timed_out, evicted }
}

/// `interval` clamped so that tokio's deadline arithmetic cannot overflow.
fn sweep_period(interval: Duration) -> Duration {
    interval.clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL)
}

/// `now - age`, saturating at the earliest representable instant.
fn cutoff(age: Duration) -> Timestamp {
    chrono::Duration::from_std(age)
        .ok()
        .and_then(|age| Utc::now().checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
