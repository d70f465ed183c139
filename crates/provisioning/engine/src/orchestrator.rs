//! Provisioning orchestrator
//!
//! Accepts provisioning requests, drives each job through the stage
//! pipeline, and serves the ownership-checked control operations.
//! Background loops ([`QueueProcessor`](crate::QueueProcessor),
//! [`ActivationScheduler`](crate::ActivationScheduler)) call back into it.

use crate::catalog::TemplateCatalog;
use crate::clock::Clock;
use crate::config::ProvisioningConfig;
use crate::credentials::extract_credentials;
use crate::error::{ProvisioningError, Result, StageError, StorageError, StorageResult};
use crate::executor::{execute_with_deadline, StageExecutor};
use crate::notifier::Notifier;
use crate::queue::JobQueue;
use crate::retention::RetentionSweeper;
use crate::secrets::{SecretMetadata, SecretsStore};
use crate::store::{job_update, JobStore, JobUpdate};
use chrono::{DateTime, Utc};
use provisioning_types::{
    Actor, Configuration, EventEnvelope, Job, JobError, JobId, JobStatistics, JobStatus,
    ProvisioningEvent, Stage, TemplateId, UserId, WorkflowId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Returned by [`Orchestrator::start_provisioning`] once the job is queued
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisioningTicket {
    pub job_id: JobId,
    pub status: JobStatus,
    pub estimated_completion: DateTime<Utc>,
}

/// Central coordinator for provisioning jobs
pub struct Orchestrator {
    config: ProvisioningConfig,
    store: Arc<dyn JobStore>,
    catalog: Arc<dyn TemplateCatalog>,
    secrets: Arc<dyn SecretsStore>,
    executor: Arc<dyn StageExecutor>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    queue: Arc<JobQueue>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: ProvisioningConfig,
        store: Arc<dyn JobStore>,
        catalog: Arc<dyn TemplateCatalog>,
        secrets: Arc<dyn SecretsStore>,
        executor: Arc<dyn StageExecutor>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        queue: Arc<JobQueue>,
    ) -> Self {
        Self {
            config,
            store,
            catalog,
            secrets,
            executor,
            notifier,
            clock,
            queue,
        }
    }

    pub fn config(&self) -> &ProvisioningConfig {
        &self.config
    }

    pub fn queue(&self) -> Arc<JobQueue> {
        self.queue.clone()
    }

    pub fn store(&self) -> Arc<dyn JobStore> {
        self.store.clone()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Validate a request, create a pending job and queue it.
    ///
    /// Returns as soon as the job is stored; stage work happens on the
    /// queue processor. On any error no job is created.
    pub async fn start_provisioning(
        &self,
        user_id: UserId,
        workflow_id: WorkflowId,
        template_id: TemplateId,
        configuration: Configuration,
    ) -> Result<ProvisioningTicket> {
        if !self.catalog.template_exists(&template_id).await? {
            tracing::warn!(template_id = %template_id, "Unknown template");
            return Err(ProvisioningError::template_not_found(&template_id));
        }

        let report = self
            .catalog
            .validate_configuration(&template_id, &configuration)
            .await?;
        if !report.valid {
            tracing::warn!(
                template_id = %template_id,
                user_id = %user_id,
                errors = report.errors.len(),
                "Configuration rejected"
            );
            return Err(ProvisioningError::validation(report.errors));
        }

        let dependencies = self.catalog.get_dependencies(&template_id).await?;
        let now = self.clock.now();
        let mut job = Job::new(
            user_id,
            workflow_id,
            template_id,
            configuration,
            &dependencies,
            now,
        );

        let credentials = extract_credentials(&job.configuration);
        if !credentials.is_empty() {
            let stored = credentials.len();
            job.secret_refs = self
                .secrets
                .store_secrets(
                    &job.user_id,
                    &job.workflow_id,
                    credentials.secrets,
                    SecretMetadata {
                        job_id: job.id.clone(),
                        template_id: job.template_id.clone(),
                        kinds: credentials.kinds,
                    },
                )
                .await?;
            tracing::debug!(job_id = %job.id, stored, "Credentials stored");
        }

        let estimated_completion = now
            .checked_add_signed(self.estimate_duration(&job.template_id).await)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let ticket = ProvisioningTicket {
            job_id: job.id.clone(),
            status: job.status,
            estimated_completion,
        };
        let event = ProvisioningEvent::JobQueued {
            job_id: job.id.clone(),
            user_id: job.user_id.clone(),
            workflow_id: job.workflow_id.clone(),
        };

        tracing::info!(
            job_id = %job.id,
            user_id = %job.user_id,
            workflow_id = %job.workflow_id,
            template_id = %job.template_id,
            "Provisioning job created"
        );

        self.store.put(job).await?;
        self.queue.push(ticket.job_id.clone());
        self.notify(event).await;

        Ok(ticket)
    }

    async fn estimate_duration(&self, template_id: &TemplateId) -> chrono::Duration {
        let declared = match self.catalog.estimated_duration(template_id).await {
            Ok(declared) => declared,
            Err(e) => {
                tracing::debug!(template_id = %template_id, error = %e, "No duration estimate");
                None
            }
        };
        let estimate = declared.unwrap_or(self.config.stage_delay() * Stage::PIPELINE.len() as u32);
        chrono::Duration::from_std(estimate).unwrap_or_else(|_| chrono::Duration::zero())
    }

    // ── Pipeline ─────────────────────────────────────────────────────

    /// Drive a job through every stage to `ready`, or to `failed` on the
    /// first stage error.
    ///
    /// Stops quietly when the job disappears or leaves the pipeline
    /// concurrently (cancellation). Never returns an error: failures are
    /// recorded on the job.
    pub async fn drive_job(&self, job_id: &JobId) {
        for stage in Stage::PIPELINE {
            let Some(snapshot) = self.enter_stage(job_id, stage).await else {
                return;
            };

            self.clock.sleep(self.config.stage_delay()).await;

            let outcome = execute_with_deadline(
                self.executor.as_ref(),
                &snapshot,
                stage,
                self.config.stage_timeout(),
            )
            .await;

            match outcome {
                Ok(()) => self.finish_stage(job_id, stage).await,
                Err(e) => {
                    self.fail_stage(job_id, stage, e).await;
                    return;
                }
            }
        }

        self.complete(job_id).await;
    }

    async fn enter_stage(&self, job_id: &JobId, stage: Stage) -> Option<Job> {
        let now = self.clock.now();
        let apply = job_update(move |job| {
            job.transition(stage.status(), now)?;
            job.begin_stage(stage, now);
            if stage == Stage::Provisioning {
                job.start_steps(now);
            }
            Ok(())
        });

        match self.store.update(job_id, apply).await {
            Ok(job) => {
                tracing::info!(job_id = %job_id, stage = %stage, "Stage started");
                Some(job)
            }
            Err(StorageError::Rejected(e)) => {
                tracing::info!(job_id = %job_id, stage = %stage, reason = %e, "Job left the pipeline");
                None
            }
            Err(StorageError::NotFound(_)) => {
                tracing::debug!(job_id = %job_id, "Job removed before stage start");
                None
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, stage = %stage, error = %e, "Failed to start stage");
                None
            }
        }
    }

    async fn finish_stage(&self, job_id: &JobId, stage: Stage) {
        let now = self.clock.now();
        let apply = job_update(move |job| {
            job.finish_stage(stage, None, now);
            if stage == Stage::Provisioning && job.status == stage.status() {
                job.complete_steps(now);
            }
            Ok(())
        });

        match self.store.update(job_id, apply).await {
            Ok(job) => {
                let duration_ms = job.stages.last().and_then(|run| run.duration_ms());
                tracing::debug!(job_id = %job_id, stage = %stage, duration_ms, "Stage completed");
            }
            Err(e) => tracing::warn!(job_id = %job_id, stage = %stage, error = %e, "Failed to record stage completion"),
        }
    }

    async fn fail_stage(&self, job_id: &JobId, stage: Stage, error: StageError) {
        let now = self.clock.now();
        let message = error.to_string();
        let recorded = message.clone();
        let apply = job_update(move |job| {
            job.finish_stage(stage, Some(recorded.clone()), now);
            if stage == Stage::Provisioning && job.status == stage.status() {
                job.fail_steps(&recorded, now);
            }
            // A concurrent cancel already failed the job
            if !job.is_terminal() {
                job.fail(recorded, now)?;
            }
            Ok(())
        });

        match self.store.update(job_id, apply).await {
            Ok(job) if job.error_message.as_deref() == Some(message.as_str()) => {
                tracing::warn!(job_id = %job_id, stage = %stage, error = %message, "Job failed");
                self.notify(ProvisioningEvent::JobFailed {
                    job_id: job_id.clone(),
                    reason: message,
                })
                .await;
            }
            Ok(_) => {
                tracing::debug!(job_id = %job_id, stage = %stage, "Stage failed after job left the pipeline");
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, stage = %stage, error = %e, "Failed to record job failure");
            }
        }
    }

    async fn complete(&self, job_id: &JobId) {
        let now = self.clock.now();
        let base = self.config.webhook_base_url.trim_end_matches('/').to_string();
        let apply = job_update(move |job| {
            job.transition(JobStatus::Ready, now)?;
            job.webhook_url = Some(format!("{}/{}/{}", base, job.workflow_id, job.id));
            Ok(())
        });

        match self.store.update(job_id, apply).await {
            Ok(job) => {
                tracing::info!(
                    job_id = %job.id,
                    workflow_id = %job.workflow_id,
                    completion_secs = job.completion_secs().unwrap_or_default(),
                    "Job ready"
                );
                let webhook_url = job.webhook_url.clone().unwrap_or_default();
                self.notify(ProvisioningEvent::JobReady {
                    job_id: job.id,
                    user_id: job.user_id,
                    workflow_id: job.workflow_id,
                    webhook_url,
                })
                .await;
            }
            Err(StorageError::Rejected(e)) => {
                tracing::info!(job_id = %job_id, reason = %e, "Job left the pipeline before ready");
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to mark job ready");
            }
        }
    }

    // ── Control operations ──────────────────────────────────────────

    /// Cancel a job that has not yet reached `testing`.
    ///
    /// Returns `false` when the job is unknown, not owned by the caller,
    /// or past the cancellable states.
    pub async fn cancel_job(&self, job_id: &JobId, actor: &Actor) -> bool {
        if !self.authorize(job_id, actor, "cancel").await {
            return false;
        }

        let now = self.clock.now();
        if !self
            .apply_control(job_id, "cancel", job_update(move |job| job.cancel(now)))
            .await
        {
            return false;
        }

        self.queue.remove(job_id);
        tracing::info!(job_id = %job_id, actor = %actor.user_id, "Job cancelled");
        self.notify(ProvisioningEvent::JobCancelled {
            job_id: job_id.clone(),
        })
        .await;
        true
    }

    /// Defer activation of a `ready` job to `activation_at`
    pub async fn schedule_activation(
        &self,
        job_id: &JobId,
        actor: &Actor,
        activation_at: DateTime<Utc>,
    ) -> bool {
        if !self.authorize(job_id, actor, "schedule").await {
            return false;
        }

        let now = self.clock.now();
        if !self
            .apply_control(
                job_id,
                "schedule",
                job_update(move |job| job.schedule(activation_at, now)),
            )
            .await
        {
            return false;
        }

        tracing::info!(job_id = %job_id, activation_at = %activation_at, "Activation scheduled");
        self.notify(ProvisioningEvent::JobScheduled {
            job_id: job_id.clone(),
            activation_at,
        })
        .await;
        true
    }

    /// Activate a `ready` job immediately
    pub async fn activate_job(&self, job_id: &JobId, actor: &Actor) -> bool {
        if !self.authorize(job_id, actor, "activate").await {
            return false;
        }

        let now = self.clock.now();
        let apply = job_update(move |job| {
            if job.status != JobStatus::Ready {
                return Err(JobError::InvalidTransition {
                    from: job.status,
                    to: JobStatus::Active,
                });
            }
            job.transition(JobStatus::Active, now)
        });
        self.activate(job_id, apply).await
    }

    /// Activate a scheduled job whose activation time has passed.
    ///
    /// The due check runs under the store lock, so concurrent sweeps
    /// activate a job at most once.
    pub async fn promote_scheduled(&self, job_id: &JobId) -> bool {
        let now = self.clock.now();
        let apply = job_update(move |job| {
            if !job.is_activation_due(now) {
                return Err(JobError::NotPermitted);
            }
            job.transition(JobStatus::Active, now)
        });
        self.activate(job_id, apply).await
    }

    async fn activate(&self, job_id: &JobId, apply: JobUpdate) -> bool {
        match self.store.update(job_id, apply).await {
            Ok(job) => {
                tracing::info!(job_id = %job.id, workflow_id = %job.workflow_id, "Workflow activated");
                self.notify(ProvisioningEvent::JobActivated {
                    job_id: job.id,
                    user_id: job.user_id,
                    workflow_id: job.workflow_id,
                })
                .await;
                true
            }
            Err(StorageError::Rejected(_)) | Err(StorageError::NotFound(_)) => false,
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Activation failed");
                false
            }
        }
    }

    /// Ownership is checked before state so callers cannot probe the
    /// state of jobs they do not own.
    async fn authorize(&self, job_id: &JobId, actor: &Actor, action: &'static str) -> bool {
        match self.store.get(job_id).await {
            Ok(Some(job)) if actor.may_act_on(&job) => true,
            Ok(Some(_)) => {
                tracing::warn!(job_id = %job_id, actor = %actor.user_id, action, "Not permitted");
                false
            }
            Ok(None) => false,
            Err(e) => {
                tracing::error!(job_id = %job_id, action, error = %e, "Job lookup failed");
                false
            }
        }
    }

    async fn apply_control(&self, job_id: &JobId, action: &'static str, apply: JobUpdate) -> bool {
        match self.store.update(job_id, apply).await {
            Ok(_) => true,
            Err(StorageError::Rejected(e)) => {
                tracing::debug!(job_id = %job_id, action, reason = %e, "Request rejected");
                false
            }
            Err(StorageError::NotFound(_)) => false,
            Err(e) => {
                tracing::error!(job_id = %job_id, action, error = %e, "Request failed");
                false
            }
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub async fn get_job_status(&self, job_id: &JobId) -> StorageResult<Option<Job>> {
        self.store.get(job_id).await
    }

    /// Jobs owned by a user, newest first
    pub async fn get_user_jobs(&self, user_id: &UserId) -> StorageResult<Vec<Job>> {
        let mut jobs = self.store.list_by_user(user_id).await?;
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    pub async fn get_jobs_by_status(&self, status: JobStatus) -> StorageResult<Vec<Job>> {
        let mut jobs = self.store.list_by_status(status).await?;
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(jobs)
    }

    pub async fn statistics(&self) -> StorageResult<JobStatistics> {
        let jobs = self.store.list_all().await?;
        Ok(JobStatistics::from_jobs(&jobs))
    }

    // ── Maintenance ─────────────────────────────────────────────────

    pub fn retention_sweeper(&self) -> RetentionSweeper {
        RetentionSweeper::new(self.store.clone(), self.queue.clone(), self.clock.clone())
    }

    /// Delete jobs created more than `threshold_days` ago
    pub async fn cleanup_old_jobs(&self, threshold_days: u32) -> StorageResult<usize> {
        self.retention_sweeper().sweep(threshold_days).await
    }

    async fn notify(&self, event: ProvisioningEvent) {
        let kind = event.kind();
        let job_id = event.job_id().clone();
        let envelope = EventEnvelope::new(event, self.clock.now());

        match tokio::time::timeout(
            self.config.notification_timeout(),
            self.notifier.notify(envelope),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(job_id = %job_id, event = kind, error = %e, "Notification failed")
            }
            Err(_) => tracing::warn!(job_id = %job_id, event = kind, "Notification timed out"),
        }
    }
}
