//! Notification events emitted by the orchestrator

use crate::{JobId, UserId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle notification for a provisioning job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProvisioningEvent {
    JobQueued {
        job_id: JobId,
        user_id: UserId,
        workflow_id: WorkflowId,
    },
    /// Pipeline finished; the workflow can be activated
    JobReady {
        job_id: JobId,
        user_id: UserId,
        workflow_id: WorkflowId,
        webhook_url: String,
    },
    JobScheduled {
        job_id: JobId,
        activation_at: DateTime<Utc>,
    },
    JobActivated {
        job_id: JobId,
        user_id: UserId,
        workflow_id: WorkflowId,
    },
    JobFailed {
        job_id: JobId,
        reason: String,
    },
    JobCancelled {
        job_id: JobId,
    },
}

impl ProvisioningEvent {
    pub fn job_id(&self) -> &JobId {
        match self {
            Self::JobQueued { job_id, .. }
            | Self::JobReady { job_id, .. }
            | Self::JobScheduled { job_id, .. }
            | Self::JobActivated { job_id, .. }
            | Self::JobFailed { job_id, .. }
            | Self::JobCancelled { job_id } => job_id,
        }
    }

    /// Short event name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JobQueued { .. } => "job_queued",
            Self::JobReady { .. } => "job_ready",
            Self::JobScheduled { .. } => "job_scheduled",
            Self::JobActivated { .. } => "job_activated",
            Self::JobFailed { .. } => "job_failed",
            Self::JobCancelled { .. } => "job_cancelled",
        }
    }
}

/// Envelope adding an emission timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: ProvisioningEvent,
}

impl EventEnvelope {
    pub fn new(event: ProvisioningEvent, timestamp: DateTime<Utc>) -> Self {
        Self { timestamp, event }
    }
}
