//! Retention sweeper
//!
//! Deletes jobs older than a threshold regardless of state. Queued ids of
//! deleted jobs are dropped so the processor never picks them up.

use crate::clock::Clock;
use crate::error::StorageResult;
use crate::queue::JobQueue;
use crate::store::JobStore;
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};
use tokio::time::{interval, Duration, MissedTickBehavior};

pub struct RetentionSweeper {
    store: Arc<dyn JobStore>,
    queue: Arc<JobQueue>,
    clock: Arc<dyn Clock>,
    running: Arc<RwLock<bool>>,
    stop_signal: Notify,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn JobStore>, queue: Arc<JobQueue>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            queue,
            clock,
            running: Arc::new(RwLock::new(false)),
            stop_signal: Notify::new(),
        }
    }

    /// Delete jobs created strictly before `now - threshold_days`.
    ///
    /// Returns the number of jobs deleted.
    pub async fn sweep(&self, threshold_days: u32) -> StorageResult<usize> {
        let cutoff = chrono::Duration::try_days(i64::from(threshold_days))
            .and_then(|age| self.clock.now().checked_sub_signed(age));
        // Nothing predates the earliest representable instant
        let Some(cutoff) = cutoff else {
            return Ok(0);
        };
        let expired: Vec<_> = self
            .store
            .list_all()
            .await?
            .into_iter()
            .filter(|job| job.created_at < cutoff)
            .collect();

        let mut deleted = 0;
        for job in &expired {
            if self.store.delete(&job.id).await? {
                self.queue.remove(&job.id);
                deleted += 1;
            }
        }

        tracing::info!(deleted, threshold_days, cutoff = %cutoff, "Retention sweep completed");
        Ok(deleted)
    }

    /// Sweep every `every` until [`stop`](Self::stop) is called
    pub async fn start(self: Arc<Self>, every: Duration, threshold_days: u32) {
        {
            let mut running = self.running.write().await;
            *running = true;
        }

        tracing::info!(
            interval_secs = every.as_secs(),
            threshold_days,
            "Retention sweeper started"
        );

        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.stop_signal.notified() => break,
            }

            if !*self.running.read().await {
                break;
            }

            if let Err(e) = self.sweep(threshold_days).await {
                tracing::error!(error = %e, "Retention sweep failed");
            }
        }

        tracing::info!("Retention sweeper stopped");
    }

    pub async fn stop(&self) {
        {
            let mut running = self.running.write().await;
            *running = false;
        }
        self.stop_signal.notify_one();
    }
}
