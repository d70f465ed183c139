//! Provisioning Engine - orchestration runtime for workflow provisioning
//!
//! The engine accepts provisioning requests, validates them against a
//! template catalog, splits credentials off to a secrets store, and drives
//! each job through the stage pipeline with bounded concurrency.
//!
//! # Key Principle
//!
//! **The orchestrator coordinates; stage work belongs to a [`StageExecutor`].**
//!
//! Every state change goes through the [`JobStore`] as an atomic update, so
//! a pipeline task and a concurrent cancel can never both win.
//!
//! # Architecture
//!
//! - [`Orchestrator`] - Request handling, pipeline driving, control operations
//! - [`QueueProcessor`] - Dispatches queued jobs, at most N in flight
//! - [`ActivationScheduler`] - Promotes due scheduled jobs to active
//! - [`RetentionSweeper`] - Deletes jobs past the retention threshold
//! - [`TemplateCatalog`] / [`SecretsStore`] / [`Notifier`] - Collaborators
//! - [`Clock`] - Injected time source, virtual in tests
//!
//! # Example
//!
//! ```rust
//! use provisioning_engine::*;
//! use provisioning_types::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let catalog = InMemoryTemplateCatalog::with_templates([
//!         TemplateDefinition::new("tmplA", "Template A").with_dependencies(&["validation"]),
//!     ])
//!     .unwrap();
//!
//!     let orchestrator = OrchestratorBuilder::new()
//!         .with_config(ProvisioningConfig::immediate())
//!         .with_catalog(Arc::new(catalog))
//!         .with_secrets(Arc::new(InMemorySecretsStore::new()))
//!         .build()
//!         .unwrap();
//!
//!     let ticket = orchestrator
//!         .start_provisioning(
//!             UserId::new("u1"),
//!             WorkflowId::new("wf1"),
//!             TemplateId::new("tmplA"),
//!             Configuration::new(),
//!         )
//!         .await
//!         .unwrap();
//!     assert_eq!(ticket.status, JobStatus::Pending);
//!
//!     orchestrator.drive_job(&ticket.job_id).await;
//!     let job = orchestrator.get_job_status(&ticket.job_id).await.unwrap().unwrap();
//!     assert_eq!(job.status, JobStatus::Ready);
//! }
//! ```

#![deny(unsafe_code)]

pub mod builder;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod credentials;
pub mod error;
pub mod executor;
pub mod notifier;
pub mod orchestrator;
pub mod queue;
pub mod retention;
pub mod scheduler;
pub mod secrets;
pub mod store;

// Re-export main types
pub use builder::OrchestratorBuilder;
pub use catalog::{
    FieldSchema, FieldType, InMemoryTemplateCatalog, TemplateCatalog, TemplateDefinition,
    ValidationReport,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ProvisioningConfig;
pub use credentials::{classify_key, extract_credentials, CredentialKind, ExtractedCredentials};
pub use error::{
    CatalogError, NotifyError, ProvisioningError, Result, SecretsError, StageError, StorageError,
    StorageResult,
};
pub use executor::{SimulatedStageExecutor, StageExecutor};
pub use notifier::{BroadcastNotifier, Notifier};
pub use orchestrator::{Orchestrator, ProvisioningTicket};
pub use queue::{JobQueue, QueueProcessor};
pub use retention::RetentionSweeper;
pub use scheduler::ActivationScheduler;
pub use secrets::{InMemorySecretsStore, SecretMetadata, SecretRecord, SecretsStore};
pub use store::{job_update, InMemoryJobStore, JobStore, JobUpdate};
