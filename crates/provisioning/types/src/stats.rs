//! Aggregate job statistics

use crate::{Job, JobStatus, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregation view over a set of jobs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStatistics {
    pub total: usize,
    pub by_status: BTreeMap<JobStatus, usize>,
    pub by_user: BTreeMap<UserId, usize>,
    /// Mean seconds from creation to completion over completed jobs
    pub average_completion_secs: Option<f64>,
    /// (ready + scheduled + active) / total, 0.0 when there are no jobs
    pub success_rate: f64,
}

impl JobStatistics {
    pub fn from_jobs<'a>(jobs: impl IntoIterator<Item = &'a Job>) -> Self {
        let mut stats = Self::default();
        let mut completion_total = 0.0;
        let mut completed = 0usize;
        let mut successes = 0usize;

        for job in jobs {
            stats.total += 1;
            *stats.by_status.entry(job.status).or_default() += 1;
            *stats.by_user.entry(job.user_id.clone()).or_default() += 1;

            if let Some(secs) = job.completion_secs() {
                completion_total += secs;
                completed += 1;
            }
            if job.status.is_success() {
                successes += 1;
            }
        }

        if completed > 0 {
            stats.average_completion_secs = Some(completion_total / completed as f64);
        }
        if stats.total > 0 {
            stats.success_rate = successes as f64 / stats.total as f64;
        }
        stats
    }

    pub fn count(&self, status: JobStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}
