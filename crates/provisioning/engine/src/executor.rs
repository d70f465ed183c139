//! Stage executor trait and the simulated executor
//!
//! The orchestrator coordinates; an executor performs the work of one
//! pipeline stage against the target system.

use crate::error::StageError;
use async_trait::async_trait;
use provisioning_types::{Job, Stage};
use rand::Rng;
use std::time::Duration;

/// Trait for pipeline stage executors
#[async_trait]
pub trait StageExecutor: Send + Sync {
    /// Execute one stage for a job
    ///
    /// # Arguments
    ///
    /// * `job` - Snapshot of the job as the stage starts
    /// * `stage` - The pipeline stage to execute
    async fn execute(&self, job: &Job, stage: Stage) -> Result<(), StageError>;

    /// Executor name for logging
    fn name(&self) -> &str;
}

/// Run a stage under a deadline; expiry counts as a stage failure.
///
/// A zero deadline disables the limit.
pub(crate) async fn execute_with_deadline(
    executor: &dyn StageExecutor,
    job: &Job,
    stage: Stage,
    deadline: Duration,
) -> Result<(), StageError> {
    if deadline.is_zero() {
        return executor.execute(job, stage).await;
    }
    match tokio::time::timeout(deadline, executor.execute(job, stage)).await {
        Ok(result) => result,
        Err(_) => Err(StageError::Timeout {
            stage,
            after: deadline,
        }),
    }
}

/// Executor that succeeds unless a random draw hits `failure_rate`
#[derive(Debug, Clone)]
pub struct SimulatedStageExecutor {
    failure_rate: f64,
}

impl SimulatedStageExecutor {
    pub fn new(failure_rate: f64) -> Self {
        Self {
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }

    /// Executor that never fails
    pub fn reliable() -> Self {
        Self::new(0.0)
    }
}

impl Default for SimulatedStageExecutor {
    fn default() -> Self {
        Self::reliable()
    }
}

#[async_trait]
impl StageExecutor for SimulatedStageExecutor {
    async fn execute(&self, job: &Job, stage: Stage) -> Result<(), StageError> {
        let failed = rand::thread_rng().gen_bool(self.failure_rate);
        if failed {
            return Err(StageError::Failed(format!(
                "Simulated {} failure for workflow {}",
                stage, job.workflow_id
            )));
        }

        tracing::debug!(job_id = %job.id, stage = %stage, "Simulated stage completed");
        Ok(())
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use provisioning_types::{Configuration, TemplateId, UserId, WorkflowId};

    fn job() -> Job {
        Job::new(
            UserId::new("u1"),
            WorkflowId::new("wf1"),
            TemplateId::new("tmplA"),
            Configuration::new(),
            &[],
            Utc::now(),
        )
    }

    struct Hanging;

    #[async_trait]
    impl StageExecutor for Hanging {
        async fn execute(&self, _job: &Job, _stage: Stage) -> Result<(), StageError> {
            std::future::pending::<()>().await;
            Ok(())
        }

        fn name(&self) -> &str {
            "hanging"
        }
    }

    #[tokio::test]
    async fn test_reliable_executor_succeeds() {
        let executor = SimulatedStageExecutor::reliable();
        for stage in Stage::PIPELINE {
            assert!(executor.execute(&job(), stage).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_always_failing_executor() {
        let executor = SimulatedStageExecutor::new(1.0);
        let err = executor.execute(&job(), Stage::Testing).await.unwrap_err();
        assert!(err.to_string().contains("testing"));
    }

    #[tokio::test]
    async fn test_failure_rate_is_clamped() {
        let executor = SimulatedStageExecutor::new(7.5);
        assert!(executor.execute(&job(), Stage::Validating).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expiry_is_stage_failure() {
        let err = execute_with_deadline(
            &Hanging,
            &job(),
            Stage::Configuring,
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            StageError::Timeout {
                stage: Stage::Configuring,
                ..
            }
        ));
    }
}
