//! Activation scheduler
//!
//! Periodically promotes `scheduled` jobs whose activation time has
//! passed to `active`.

use crate::error::StorageResult;
use crate::orchestrator::Orchestrator;
use provisioning_types::JobStatus;
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Sweeps scheduled jobs on a fixed interval
pub struct ActivationScheduler {
    orchestrator: Arc<Orchestrator>,
    sweep_interval: Duration,
    running: Arc<RwLock<bool>>,
    stop_signal: Notify,
}

impl ActivationScheduler {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Arc<Self> {
        let sweep_interval = orchestrator.config().activation_sweep_interval();
        Arc::new(Self {
            orchestrator,
            sweep_interval,
            running: Arc::new(RwLock::new(false)),
            stop_signal: Notify::new(),
        })
    }

    /// Activate every due job once; returns how many were activated.
    ///
    /// Running a sweep twice at the same instant activates nothing the
    /// second time.
    pub async fn sweep(&self) -> StorageResult<usize> {
        let now = self.orchestrator.clock().now();
        let due: Vec<_> = self
            .orchestrator
            .store()
            .list_by_status(JobStatus::Scheduled)
            .await?
            .into_iter()
            .filter(|job| job.is_activation_due(now))
            .collect();

        let mut activated = 0;
        for job in &due {
            if self.orchestrator.promote_scheduled(&job.id).await {
                activated += 1;
            }
        }

        if activated > 0 {
            tracing::info!(activated, "Scheduled activations applied");
        }
        Ok(activated)
    }

    /// Run the sweep loop until [`stop`](Self::stop) is called
    pub async fn start(self: Arc<Self>) {
        {
            let mut running = self.running.write().await;
            *running = true;
        }

        tracing::info!(
            interval_secs = self.sweep_interval.as_secs(),
            "Activation scheduler started"
        );

        let mut ticker = interval(self.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.stop_signal.notified() => break,
            }

            if !*self.running.read().await {
                break;
            }

            if let Err(e) = self.sweep().await {
                tracing::error!(error = %e, "Activation sweep failed");
            }
        }

        tracing::info!("Activation scheduler stopped");
    }

    pub async fn stop(&self) {
        {
            let mut running = self.running.write().await;
            *running = false;
        }
        self.stop_signal.notify_one();
    }
}
