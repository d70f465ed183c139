//! Daemon wiring: orchestrator, background loops and the event log

use crate::config::DaemonConfig;
use crate::error::DaemonResult;
use provisioning_engine::{
    ActivationScheduler, BroadcastNotifier, InMemorySecretsStore, InMemoryTemplateCatalog,
    Orchestrator, OrchestratorBuilder, QueueProcessor, RetentionSweeper, SimulatedStageExecutor,
};
use provisioning_types::{EventEnvelope, ProvisioningEvent};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Provisioning daemon
pub struct Server {
    config: DaemonConfig,
    orchestrator: Arc<Orchestrator>,
    processor: Arc<QueueProcessor>,
    scheduler: Arc<ActivationScheduler>,
    retention: Arc<RetentionSweeper>,
    notifier: Arc<BroadcastNotifier>,
}

impl Server {
    /// Create a new server
    pub fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let catalog = InMemoryTemplateCatalog::with_templates(config.templates.clone())
            .map_err(provisioning_engine::ProvisioningError::from)?;
        tracing::info!(templates = catalog.len(), "Template catalog loaded");

        let notifier = Arc::new(BroadcastNotifier::default());
        let orchestrator = OrchestratorBuilder::new()
            .with_config(config.provisioning.clone())
            .with_catalog(Arc::new(catalog))
            .with_secrets(Arc::new(InMemorySecretsStore::new()))
            .with_executor(Arc::new(SimulatedStageExecutor::new(
                config.executor.failure_rate,
            )))
            .with_notifier(notifier.clone())
            .build()?;

        let processor = QueueProcessor::new(orchestrator.clone());
        let scheduler = ActivationScheduler::new(orchestrator.clone());
        let retention = Arc::new(orchestrator.retention_sweeper());

        Ok(Self {
            config,
            orchestrator,
            processor,
            scheduler,
            retention,
            notifier,
        })
    }

    pub fn orchestrator(&self) -> Arc<Orchestrator> {
        self.orchestrator.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.notifier.subscribe()
    }

    /// Spawn the background loops and the event log
    pub fn spawn_background(&self) -> Vec<JoinHandle<()>> {
        let mut handles = vec![
            tokio::spawn(log_events(self.subscribe())),
            tokio::spawn(self.processor.clone().start()),
            tokio::spawn(self.scheduler.clone().start()),
        ];

        if let Some(every) = self.config.provisioning.retention_sweep_interval() {
            handles.push(tokio::spawn(
                self.retention
                    .clone()
                    .start(every, self.config.provisioning.retention_days),
            ));
        }

        handles
    }

    /// Stop the background loops; jobs in flight run to completion
    pub async fn stop(&self) {
        self.processor.stop().await;
        self.scheduler.stop().await;
        self.retention.stop().await;
    }

    /// Run until a shutdown signal arrives
    pub async fn run(self) -> DaemonResult<()> {
        tracing::info!(
            max_concurrent = self.config.provisioning.max_concurrent_jobs,
            queue_tick_secs = self.config.provisioning.queue_tick_secs,
            activation_sweep_secs = self.config.provisioning.activation_sweep_secs,
            "Provisioning daemon started"
        );

        let handles = self.spawn_background();

        shutdown_signal().await;
        tracing::info!("Provisioning daemon shutting down");

        self.stop().await;
        for handle in handles.into_iter().skip(1) {
            handle.await?;
        }

        let stats = self.orchestrator.statistics().await?;
        tracing::info!(
            total = stats.total,
            success_rate = stats.success_rate,
            in_flight = self.processor.in_flight(),
            "Final job statistics"
        );

        Ok(())
    }
}

/// Write every lifecycle event to the log
async fn log_events(mut rx: broadcast::Receiver<EventEnvelope>) {
    loop {
        match rx.recv().await {
            Ok(envelope) => log_event(&envelope),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event log lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn log_event(envelope: &EventEnvelope) {
    let job_id = envelope.event.job_id();
    let kind = envelope.event.kind();
    match &envelope.event {
        ProvisioningEvent::JobFailed { reason, .. } => {
            tracing::warn!(job_id = %job_id, event = kind, reason = %reason, "Lifecycle event")
        }
        ProvisioningEvent::JobReady { webhook_url, .. } => {
            tracing::info!(job_id = %job_id, event = kind, webhook_url = %webhook_url, "Lifecycle event")
        }
        _ => tracing::info!(job_id = %job_id, event = kind, "Lifecycle event"),
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provisioning_types::{Configuration, TemplateId, UserId, WorkflowId};
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_server_provisions_to_ready() {
        let mut config = DaemonConfig::default();
        config.provisioning.stage_delay_ms = 0;
        let server = Server::new(config).unwrap();
        let mut events = server.subscribe();
        let handles = server.spawn_background();

        let mut configuration = Configuration::new();
        configuration.insert("region".into(), json!("us"));
        let ticket = server
            .orchestrator()
            .start_provisioning(
                UserId::new("u1"),
                WorkflowId::new("wf1"),
                TemplateId::new("web-service"),
                configuration,
            )
            .await
            .unwrap();

        let ready = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let envelope = events.recv().await.unwrap();
                if matches!(envelope.event, ProvisioningEvent::JobReady { .. }) {
                    break envelope;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(ready.event.job_id(), &ticket.job_id);

        server.stop().await;
        for handle in handles.into_iter().skip(1) {
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[test]
    fn test_invalid_template_pattern_rejected() {
        let mut config = DaemonConfig::default();
        config.templates[0].fields[0].pattern = Some("([unclosed".into());
        assert!(Server::new(config).is_err());
    }
}
