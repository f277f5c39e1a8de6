//! Periodic pipeline runner.
//!
//! Runs one cycle right away, then one per interval, until the shutdown
//! flag is set. Run outcomes land in a shared [`RunStats`] that the health
//! endpoint reads.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::pipeline::runner::{CycleReport, Pipeline};

pub type SharedStats = Arc<RwLock<RunStats>>;

/// Counters and timestamps for scheduled runs.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub running: bool,
    pub interval: Duration,
    pub runs: u64,
    pub successes: u64,
    pub failures: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    /// Error of the most recent run; cleared by the next success.
    pub last_error: Option<String>,
    pub last_report: Option<CycleReport>,
}

/// Serializable view served by `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub healthy: bool,
    pub status: &'static str,
    pub running: bool,
    pub runs: u64,
    pub successes: u64,
    pub failures: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_report: Option<CycleReport>,
}

impl RunStats {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    pub fn shared(interval: Duration) -> SharedStats {
        Arc::new(RwLock::new(Self::new(interval)))
    }

    pub fn record_success(&mut self, report: CycleReport, at: DateTime<Utc>) {
        self.runs += 1;
        self.successes += 1;
        self.last_run = Some(at);
        self.last_success = Some(at);
        self.last_error = None;
        self.last_report = Some(report);
    }

    pub fn record_failure(&mut self, error: String, at: DateTime<Utc>) {
        self.runs += 1;
        self.failures += 1;
        self.last_run = Some(at);
        self.last_error = Some(error);
    }

    /// Healthy when the loop is running, has run at least once, the last run
    /// succeeded, and the last run is no older than two intervals.
    pub fn health_snapshot(&self, now: DateTime<Utc>) -> HealthSnapshot {
        let fresh = match self.last_run {
            Some(at) => {
                let max_age = self
                    .interval
                    .checked_mul(2)
                    .and_then(|d| chrono::Duration::from_std(d).ok())
                    .unwrap_or(chrono::Duration::MAX);
                now.signed_duration_since(at) <= max_age
            }
            None => false,
        };
        let healthy = self.running && self.runs > 0 && self.last_error.is_none() && fresh;

        HealthSnapshot {
            healthy,
            status: if healthy { "healthy" } else { "unhealthy" },
            running: self.running,
            runs: self.runs,
            successes: self.successes,
            failures: self.failures,
            last_run: self.last_run,
            last_success: self.last_success,
            last_error: self.last_error.clone(),
            last_report: self.last_report.clone(),
        }
    }
}

/// Spawn the scheduler loop.
///
/// Returns a `JoinHandle` and a shutdown flag. Set the flag to stop after
/// the current tick. A failed cycle is logged and recorded; the loop keeps
/// going.
pub fn spawn_scheduler(
    pipeline: Arc<Pipeline>,
    interval: Duration,
    stats: SharedStats,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        info!(
            interval_secs = interval.as_secs(),
            pointer_key = %pipeline.pointer_key(),
            "Scheduler started"
        );
        {
            let mut s = stats.write().await;
            s.running = true;
            s.interval = interval;
        }

        // First tick completes immediately.
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tick.tick().await;

            if shutdown.load(Ordering::Relaxed) {
                info!("Scheduler shutting down");
                break;
            }

            run_once(&pipeline, &stats).await;
        }

        stats.write().await.running = false;
    });

    (handle, shutdown_flag)
}

async fn run_once(pipeline: &Pipeline, stats: &SharedStats) {
    let result = pipeline.run_cycle().await;
    let now = Utc::now();
    let mut s = stats.write().await;
    match result {
        Ok(report) => s.record_success(report, now),
        Err(e) => {
            error!(error = %e, "Pipeline cycle failed");
            s.record_failure(e.to_string(), now);
        }
    }
}
