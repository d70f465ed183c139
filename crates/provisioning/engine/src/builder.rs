//! Builder for [`Orchestrator`]
//!
//! The catalog and secrets store are required. Every other collaborator
//! falls back to an in-process default.

use crate::catalog::TemplateCatalog;
use crate::clock::{Clock, SystemClock};
use crate::config::ProvisioningConfig;
use crate::error::{ProvisioningError, Result};
use crate::executor::{SimulatedStageExecutor, StageExecutor};
use crate::notifier::{BroadcastNotifier, Notifier};
use crate::orchestrator::Orchestrator;
use crate::queue::JobQueue;
use crate::secrets::SecretsStore;
use crate::store::{InMemoryJobStore, JobStore};
use std::sync::Arc;

/// Builder for constructing an [`Orchestrator`] with its collaborators
#[derive(Default)]
pub struct OrchestratorBuilder {
    config: Option<ProvisioningConfig>,
    store: Option<Arc<dyn JobStore>>,
    catalog: Option<Arc<dyn TemplateCatalog>>,
    secrets: Option<Arc<dyn SecretsStore>>,
    executor: Option<Arc<dyn StageExecutor>>,
    notifier: Option<Arc<dyn Notifier>>,
    clock: Option<Arc<dyn Clock>>,
    queue: Option<Arc<JobQueue>>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: ProvisioningConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn TemplateCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_secrets(mut self, secrets: Arc<dyn SecretsStore>) -> Self {
        self.secrets = Some(secrets);
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn StageExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Share a queue with another component instead of creating one
    pub fn with_queue(mut self, queue: Arc<JobQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn build(self) -> Result<Arc<Orchestrator>> {
        let catalog = self
            .catalog
            .ok_or_else(|| ProvisioningError::InvalidRequest("catalog required".into()))?;
        let secrets = self
            .secrets
            .ok_or_else(|| ProvisioningError::InvalidRequest("secrets store required".into()))?;

        let config = self.config.unwrap_or_default();
        config.validate().map_err(ProvisioningError::InvalidRequest)?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryJobStore::new()));
        let executor = self
            .executor
            .unwrap_or_else(|| Arc::new(SimulatedStageExecutor::default()));
        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(BroadcastNotifier::default()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let queue = self.queue.unwrap_or_default();

        tracing::debug!(
            executor = executor.name(),
            max_concurrent = config.max_concurrent_jobs,
            "Orchestrator built"
        );

        Ok(Arc::new(Orchestrator::new(
            config, store, catalog, secrets, executor, notifier, clock, queue,
        )))
    }
}
