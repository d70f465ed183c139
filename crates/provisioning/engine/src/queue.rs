//! FIFO job queue and the bounded-concurrency processor that drains it

use crate::orchestrator::Orchestrator;
use provisioning_types::JobId;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, RwLock};
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Ids of jobs waiting for a processing slot, in arrival order
#[derive(Debug, Default)]
pub struct JobQueue {
    pending: Mutex<VecDeque<JobId>>,
    wake: Notify,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job and wake the processor
    pub fn push(&self, job_id: JobId) {
        self.with_pending(|pending| pending.push_back(job_id));
        self.wake.notify_one();
    }

    pub fn pop(&self) -> Option<JobId> {
        self.with_pending(|pending| pending.pop_front())
    }

    /// Drop a job from the queue; returns whether it was queued
    pub fn remove(&self, job_id: &JobId) -> bool {
        self.with_pending(|pending| {
            let before = pending.len();
            pending.retain(|queued| queued != job_id);
            pending.len() != before
        })
    }

    pub fn contains(&self, job_id: &JobId) -> bool {
        self.with_pending(|pending| pending.contains(job_id))
    }

    pub fn len(&self) -> usize {
        self.with_pending(|pending| pending.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ask the processor to run a tick now
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    /// Resolves on the next `push` or `wake`
    pub async fn woken(&self) {
        self.wake.notified().await;
    }

    fn with_pending<R>(&self, f: impl FnOnce(&mut VecDeque<JobId>) -> R) -> R {
        // A panic while holding the lock cannot leave the deque half-updated
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut pending)
    }
}

/// Releases a processing slot when a job task ends, even by panic
struct SlotGuard {
    in_flight: Arc<AtomicUsize>,
    queue: Arc<JobQueue>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.queue.wake();
    }
}

/// Dispatches queued jobs with at most `max_concurrent_jobs` in flight
pub struct QueueProcessor {
    orchestrator: Arc<Orchestrator>,
    queue: Arc<JobQueue>,
    max_concurrent: usize,
    tick: Duration,
    in_flight: Arc<AtomicUsize>,
    running: Arc<RwLock<bool>>,
    stop_signal: Notify,
}

impl QueueProcessor {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Arc<Self> {
        let config = orchestrator.config();
        let max_concurrent = config.max_concurrent_jobs.max(1);
        let tick = config.queue_tick();
        let queue = orchestrator.queue();

        Arc::new(Self {
            orchestrator,
            queue,
            max_concurrent,
            tick,
            in_flight: Arc::new(AtomicUsize::new(0)),
            running: Arc::new(RwLock::new(false)),
            stop_signal: Notify::new(),
        })
    }

    /// Jobs currently being driven
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Jobs waiting for a slot
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Dispatch queued jobs until the queue is empty or every slot is taken.
    ///
    /// Each job runs on its own task; this never waits for a job to finish.
    /// Returns the number of jobs dispatched.
    pub fn pump(&self) -> usize {
        let mut dispatched = 0;

        loop {
            let reserved = self
                .in_flight
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                    (n < self.max_concurrent).then_some(n + 1)
                })
                .is_ok();
            if !reserved {
                break;
            }

            let Some(job_id) = self.queue.pop() else {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                break;
            };

            let guard = SlotGuard {
                in_flight: self.in_flight.clone(),
                queue: self.queue.clone(),
            };
            let orchestrator = self.orchestrator.clone();

            tracing::debug!(job_id = %job_id, "Dispatching job");
            tokio::spawn(async move {
                let _guard = guard;
                orchestrator.drive_job(&job_id).await;
            });
            dispatched += 1;
        }

        dispatched
    }

    /// Run the processing loop until [`stop`](Self::stop) is called
    pub async fn start(self: Arc<Self>) {
        {
            let mut running = self.running.write().await;
            *running = true;
        }

        tracing::info!(
            max_concurrent = self.max_concurrent,
            tick_secs = self.tick.as_secs(),
            "Queue processor started"
        );

        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.queue.woken() => {}
                _ = self.stop_signal.notified() => break,
            }

            if !*self.running.read().await {
                break;
            }

            let dispatched = self.pump();
            if dispatched > 0 {
                tracing::debug!(
                    dispatched,
                    in_flight = self.in_flight(),
                    queued = self.queue.len(),
                    "Queue tick"
                );
            }
        }

        tracing::info!("Queue processor stopped");
    }

    /// Stop the loop; jobs already in flight run to completion
    pub async fn stop(&self) {
        {
            let mut running = self.running.write().await;
            *running = false;
        }
        self.stop_signal.notify_one();
    }
}
