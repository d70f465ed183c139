//! Provisioning Types - Core types for the provisioning orchestrator
//!
//! A provisioning [`Job`] takes a workflow instance from a catalog template
//! and a user configuration through a fixed pipeline of stages, ending in
//! a quiescent `ready` state from which it is activated immediately or at
//! a scheduled time.
//!
//! ## Key Concepts
//!
//! - **Job**: One provisioning attempt for a user + workflow + template
//! - **Stage**: One of the fixed pipeline phases every job is driven through
//! - **Step**: A dependency-level record derived from the template
//! - **Events**: Lifecycle notifications for observers

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod actor;
pub mod events;
pub mod ids;
pub mod job;
pub mod stats;

// Re-export main types
pub use actor::Actor;
pub use events::{EventEnvelope, ProvisioningEvent};
pub use ids::{JobId, SecretId, TemplateId, UserId, WorkflowId};
pub use job::{
    Configuration, Job, JobError, JobStatus, Stage, StageRun, Step, StepStatus,
    CANCELLED_BY_USER,
};
pub use stats::JobStatistics;
