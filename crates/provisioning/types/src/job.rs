//! Provisioning jobs and their lifecycle state machine
//!
//! A [`Job`] is one provisioning attempt for a user + workflow + template
//! triple. Its [`JobStatus`] only moves forward along the pipeline:
//!
//! ```text
//! pending -> validating -> provisioning -> configuring -> testing -> ready
//! ready -> scheduled -> active
//! ready -> active
//! (any non-terminal) -> failed
//! ```
//!
//! `active` and `failed` are terminal. `ready` is quiescent: the owner
//! either activates immediately or schedules an activation time.

use crate::{JobId, SecretId, TemplateId, UserId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Caller-supplied configuration, retained on the job for audit/replay
pub type Configuration = HashMap<String, serde_json::Value>;

/// Message recorded on jobs cancelled by their owner
pub const CANCELLED_BY_USER: &str = "Cancelled by user";

// ── Job Status ───────────────────────────────────────────────────────

/// Lifecycle state of a provisioning job
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created and queued, not yet picked up
    #[default]
    Pending,
    Validating,
    Provisioning,
    Configuring,
    Testing,
    /// Pipeline finished, waiting for the owner to activate or schedule
    Ready,
    /// Activation deferred until `scheduled_activation`
    Scheduled,
    Active,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 9] = [
        JobStatus::Pending,
        JobStatus::Validating,
        JobStatus::Provisioning,
        JobStatus::Configuring,
        JobStatus::Testing,
        JobStatus::Ready,
        JobStatus::Scheduled,
        JobStatus::Active,
        JobStatus::Failed,
    ];

    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Active | Self::Failed)
    }

    /// States in which the owner may still cancel the job
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Validating | Self::Provisioning | Self::Configuring
        )
    }

    /// States counted as a successful provisioning outcome
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ready | Self::Scheduled | Self::Active)
    }

    /// Whether the state machine has an edge from `self` to `next`
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Pending, Validating)
            | (Validating, Provisioning)
            | (Provisioning, Configuring)
            | (Configuring, Testing)
            | (Testing, Ready)
            | (Ready, Scheduled)
            | (Ready, Active)
            | (Scheduled, Active) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Validating => "validating",
            Self::Provisioning => "provisioning",
            Self::Configuring => "configuring",
            Self::Testing => "testing",
            Self::Ready => "ready",
            Self::Scheduled => "scheduled",
            Self::Active => "active",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Pipeline Stages ──────────────────────────────────────────────────

/// A working phase of the provisioning pipeline.
///
/// Every job is driven through these in order; the pipeline ends in
/// [`JobStatus::Ready`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validating,
    Provisioning,
    Configuring,
    Testing,
}

impl Stage {
    pub const PIPELINE: [Stage; 4] = [
        Stage::Validating,
        Stage::Provisioning,
        Stage::Configuring,
        Stage::Testing,
    ];

    /// Job status held while this stage runs
    pub fn status(&self) -> JobStatus {
        match self {
            Self::Validating => JobStatus::Validating,
            Self::Provisioning => JobStatus::Provisioning,
            Self::Configuring => JobStatus::Configuring,
            Self::Testing => JobStatus::Testing,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.status().as_str()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timing record for one executed stage
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageRun {
    pub stage: Stage,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageRun {
    pub fn duration_ms(&self) -> Option<i64> {
        self.completed_at
            .map(|end| end.signed_duration_since(self.started_at).num_milliseconds())
    }
}

// ── Steps ────────────────────────────────────────────────────────────

/// Status of a dependency-level step
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// A dependency-level record derived from the template, kept for observability
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Step {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Pending,
            started_at: None,
            completed_at: None,
            error_message: None,
        }
    }
}

// ── Errors ───────────────────────────────────────────────────────────

/// Rejected job mutations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Operation not permitted")]
    NotPermitted,
}

// ── Job ──────────────────────────────────────────────────────────────

/// One provisioning attempt
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub user_id: UserId,
    pub workflow_id: WorkflowId,
    pub template_id: TemplateId,
    pub status: JobStatus,
    pub configuration: Configuration,
    /// Fixed at creation from the template's dependency list
    pub steps: Vec<Step>,
    /// One entry per executed pipeline stage
    #[serde(default)]
    pub stages: Vec<StageRun>,
    /// References returned by the secrets store for extracted credentials
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secret_refs: Vec<SecretId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_activation: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a pending job with one step per template dependency
    pub fn new(
        user_id: UserId,
        workflow_id: WorkflowId,
        template_id: TemplateId,
        configuration: Configuration,
        dependencies: &[String],
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: JobId::generate(),
            user_id,
            workflow_id,
            template_id,
            status: JobStatus::Pending,
            configuration,
            steps: dependencies.iter().map(Step::new).collect(),
            stages: Vec::new(),
            secret_refs: Vec::new(),
            scheduled_activation: None,
            completed_at: None,
            error_message: None,
            webhook_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to `next`, enforcing the state machine
    pub fn transition(&mut self, next: JobStatus, now: DateTime<Utc>) -> Result<(), JobError> {
        if !self.status.can_transition_to(next) {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        self.status = next;
        self.updated_at = now;
        if next != JobStatus::Scheduled {
            self.scheduled_activation = None;
        }
        if matches!(next, JobStatus::Ready | JobStatus::Failed) {
            self.completed_at = Some(now);
        }
        Ok(())
    }

    /// Fail the job with a message
    pub fn fail(&mut self, message: impl Into<String>, now: DateTime<Utc>) -> Result<(), JobError> {
        self.transition(JobStatus::Failed, now)?;
        self.error_message = Some(message.into());
        Ok(())
    }

    /// Owner cancellation: only from the early pipeline states
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), JobError> {
        if !self.status.is_cancellable() {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to: JobStatus::Failed,
            });
        }
        self.fail(CANCELLED_BY_USER, now)?;
        self.reset_steps();
        Ok(())
    }

    /// Defer activation of a ready job
    pub fn schedule(&mut self, at: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), JobError> {
        self.transition(JobStatus::Scheduled, now)?;
        self.scheduled_activation = Some(at);
        Ok(())
    }

    /// Whether a scheduled activation is due at `now`
    pub fn is_activation_due(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Scheduled
            && self.scheduled_activation.is_some_and(|at| at <= now)
    }

    // ── Stage / step bookkeeping ─────────────────────────────────────

    pub fn begin_stage(&mut self, stage: Stage, now: DateTime<Utc>) {
        self.stages.push(StageRun {
            stage,
            started_at: now,
            completed_at: None,
            error: None,
        });
    }

    pub fn finish_stage(&mut self, stage: Stage, error: Option<String>, now: DateTime<Utc>) {
        if let Some(run) = self
            .stages
            .iter_mut()
            .rev()
            .find(|r| r.stage == stage && r.completed_at.is_none())
        {
            run.completed_at = Some(now);
            run.error = error;
        }
    }

    pub fn start_steps(&mut self, now: DateTime<Utc>) {
        for step in self.steps.iter_mut().filter(|s| s.status == StepStatus::Pending) {
            step.status = StepStatus::InProgress;
            step.started_at = Some(now);
        }
    }

    /// Return steps left `in_progress` to `pending`
    pub fn reset_steps(&mut self) {
        for step in self
            .steps
            .iter_mut()
            .filter(|s| s.status == StepStatus::InProgress)
        {
            step.status = StepStatus::Pending;
            step.started_at = None;
        }
    }

    pub fn complete_steps(&mut self, now: DateTime<Utc>) {
        for step in self
            .steps
            .iter_mut()
            .filter(|s| s.status == StepStatus::InProgress)
        {
            step.status = StepStatus::Completed;
            step.completed_at = Some(now);
        }
    }

    pub fn fail_steps(&mut self, message: &str, now: DateTime<Utc>) {
        for step in self
            .steps
            .iter_mut()
            .filter(|s| s.status == StepStatus::InProgress)
        {
            step.status = StepStatus::Failed;
            step.completed_at = Some(now);
            step.error_message = Some(message.to_string());
        }
    }

    /// Wall-clock time from creation to completion
    pub fn completion_secs(&self) -> Option<f64> {
        self.completed_at.map(|end| {
            end.signed_duration_since(self.created_at).num_milliseconds() as f64 / 1000.0
        })
    }
}
