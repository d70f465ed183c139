//! In-memory job store

use super::traits::{JobStore, JobUpdate};
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use provisioning_types::{Job, JobId, JobStatus, UserId};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Lock-protected job table for the lifetime of the process
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn get(&self, id: &JobId) -> StorageResult<Option<Job>> {
        let jobs = self.jobs.read().await;
        Ok(jobs.get(id).cloned())
    }

    async fn put(&self, job: Job) -> StorageResult<()> {
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn update(&self, id: &JobId, apply: JobUpdate) -> StorageResult<Job> {
        let mut jobs = self.jobs.write().await;
        let stored = jobs
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(id.clone()))?;

        let mut candidate = stored.clone();
        apply(&mut candidate)?;
        *stored = candidate.clone();
        Ok(candidate)
    }

    async fn list_all(&self) -> StorageResult<Vec<Job>> {
        let jobs = self.jobs.read().await;
        Ok(jobs.values().cloned().collect())
    }

    async fn list_by_user(&self, user_id: &UserId) -> StorageResult<Vec<Job>> {
        let jobs = self.jobs.read().await;
        Ok(jobs
            .values()
            .filter(|j| &j.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_by_status(&self, status: JobStatus) -> StorageResult<Vec<Job>> {
        let jobs = self.jobs.read().await;
        Ok(jobs
            .values()
            .filter(|j| j.status == status)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: &JobId) -> StorageResult<bool> {
        let mut jobs = self.jobs.write().await;
        Ok(jobs.remove(id).is_some())
    }

    async fn count(&self) -> StorageResult<usize> {
        Ok(self.jobs.read().await.len())
    }
}
