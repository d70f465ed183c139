//! Storage trait definitions

use crate::error::StorageResult;
use async_trait::async_trait;
use provisioning_types::{Job, JobError, JobId, JobStatus, UserId};

/// Atomic in-place mutation of a stored job.
///
/// Returning an error leaves the stored job unchanged.
pub type JobUpdate = Box<dyn FnOnce(&mut Job) -> Result<(), JobError> + Send>;

/// Box a closure as a [`JobUpdate`]
pub fn job_update<F>(apply: F) -> JobUpdate
where
    F: FnOnce(&mut Job) -> Result<(), JobError> + Send + 'static,
{
    Box::new(apply)
}

/// Storage for provisioning jobs
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Get a job by ID
    async fn get(&self, id: &JobId) -> StorageResult<Option<Job>>;

    /// Create or replace a job
    async fn put(&self, job: Job) -> StorageResult<()>;

    /// Apply `apply` to the stored job under the store's lock and return
    /// the updated job
    async fn update(&self, id: &JobId, apply: JobUpdate) -> StorageResult<Job>;

    /// List all jobs
    async fn list_all(&self) -> StorageResult<Vec<Job>>;

    /// List jobs owned by a user
    async fn list_by_user(&self, user_id: &UserId) -> StorageResult<Vec<Job>>;

    /// List jobs currently in `status`
    async fn list_by_status(&self, status: JobStatus) -> StorageResult<Vec<Job>>;

    /// Delete a job by ID
    async fn delete(&self, id: &JobId) -> StorageResult<bool>;

    /// Number of stored jobs
    async fn count(&self) -> StorageResult<usize> {
        Ok(self.list_all().await?.len())
    }
}
