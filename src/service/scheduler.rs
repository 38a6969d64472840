//! Periodic background refresh

use super::updater::UpdateCoordinator;
use crate::core::{RateResult, UpdateReport};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

struct Running {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

/// Runs the update coordinator every `period` on a background task.
///
/// Stopping cancels only the wait between cycles. A cycle already in
/// progress always runs to completion first.
pub struct Scheduler {
    coordinator: Arc<UpdateCoordinator>,
    period: Duration,
    running: Mutex<Option<Running>>,
}

impl Scheduler {
    pub fn new(coordinator: Arc<UpdateCoordinator>, period: Duration) -> Self {
        Self {
            coordinator,
            period,
            running: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Starts the background loop. Returns `false` if it was already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> bool {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            warn!("Scheduler is already running");
            return false;
        }

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.coordinator),
            self.period,
            shutdown.clone(),
        ));
        *running = Some(Running { shutdown, handle });
        info!(interval_secs = self.period.as_secs(), "Scheduler started");
        true
    }

    /// Signals the loop to exit and waits up to `timeout` for it.
    ///
    /// Returns `false` if the loop was not running or did not finish in time.
    pub async fn stop(&self, timeout: Duration) -> bool {
        let Some(Running { shutdown, handle }) = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            info!("Scheduler is not running");
            return false;
        };

        info!("Stopping scheduler");
        shutdown.cancel();
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => {
                info!("Scheduler stopped");
                true
            }
            Ok(Err(e)) => {
                error!(error = %e, "Scheduler task ended abnormally");
                false
            }
            Err(_) => {
                warn!(?timeout, "Scheduler did not stop in time");
                false
            }
        }
    }

    /// Runs a single cycle right now, outside the schedule.
    pub async fn run_once(&self) -> RateResult<UpdateReport> {
        self.coordinator.run_update(None).await
    }
}

async fn run_loop(
    coordinator: Arc<UpdateCoordinator>,
    period: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!("Scheduler received shutdown signal");
                break;
            }
            _ = ticker.tick() => {
                scheduled_update(&coordinator).await;
            }
        }
    }
}

/// One scheduled cycle. Errors and panics are logged and never end the loop.
async fn scheduled_update(coordinator: &Arc<UpdateCoordinator>) {
    info!("Running scheduled rates update");
    let coordinator = Arc::clone(coordinator);
    match tokio::spawn(async move { coordinator.run_update(None).await }).await {
        Ok(Ok(report)) if report.success => {
            info!(total = report.total_rates, "Scheduled update completed");
        }
        Ok(Ok(report)) => {
            warn!(
                errors = report.errors.len(),
                "Scheduled update completed with errors"
            );
        }
        Ok(Err(e)) => error!(error = %e, "Scheduled update failed"),
        Err(e) => error!(error = %e, "Scheduled update panicked"),
    }
}
