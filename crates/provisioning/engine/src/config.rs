//! Orchestrator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning for the orchestrator and its background loops
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    /// Maximum jobs driven concurrently by the queue processor
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_jobs: usize,

    /// Queue processor tick interval in seconds
    #[serde(default = "default_queue_tick")]
    pub queue_tick_secs: u64,

    /// Activation scheduler sweep interval in seconds
    #[serde(default = "default_activation_sweep")]
    pub activation_sweep_secs: u64,

    /// Simulated latency before each pipeline stage, in milliseconds
    #[serde(default = "default_stage_delay")]
    pub stage_delay_ms: u64,

    /// Deadline for a single stage execution in seconds
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_secs: u64,

    /// Deadline for delivering one notification in seconds
    #[serde(default = "default_notification_timeout")]
    pub notification_timeout_secs: u64,

    /// Base URL used to mint per-job webhook URLs
    #[serde(default = "default_webhook_base_url")]
    pub webhook_base_url: String,

    /// Age threshold for the retention sweeper in days
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Run the retention sweeper periodically (seconds); disabled when unset
    #[serde(default)]
    pub retention_sweep_secs: Option<u64>,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent(),
            queue_tick_secs: default_queue_tick(),
            activation_sweep_secs: default_activation_sweep(),
            stage_delay_ms: default_stage_delay(),
            stage_timeout_secs: default_stage_timeout(),
            notification_timeout_secs: default_notification_timeout(),
            webhook_base_url: default_webhook_base_url(),
            retention_days: default_retention_days(),
            retention_sweep_secs: None,
        }
    }
}

impl ProvisioningConfig {
    /// Reject settings the background loops cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_jobs == 0 {
            return Err("max_concurrent_jobs must be at least 1".into());
        }
        if self.queue_tick_secs == 0 {
            return Err("queue_tick_secs must be at least 1".into());
        }
        if self.activation_sweep_secs == 0 {
            return Err("activation_sweep_secs must be at least 1".into());
        }
        if self.retention_sweep_secs == Some(0) {
            return Err("retention_sweep_secs must be at least 1 when set".into());
        }
        Ok(())
    }

    /// Configuration for tests: no simulated latency
    pub fn immediate() -> Self {
        Self {
            stage_delay_ms: 0,
            ..Default::default()
        }
    }

    pub fn queue_tick(&self) -> Duration {
        Duration::from_secs(self.queue_tick_secs.max(1))
    }

    pub fn activation_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.activation_sweep_secs.max(1))
    }

    pub fn stage_delay(&self) -> Duration {
        Duration::from_millis(self.stage_delay_ms)
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }

    pub fn notification_timeout(&self) -> Duration {
        Duration::from_secs(self.notification_timeout_secs)
    }

    pub fn retention_sweep_interval(&self) -> Option<Duration> {
        self.retention_sweep_secs
            .map(|secs| Duration::from_secs(secs.max(1)))
    }
}

// Default value helpers
fn default_max_concurrent() -> usize {
    3
}

fn default_queue_tick() -> u64 {
    10
}

fn default_activation_sweep() -> u64 {
    60
}

fn default_stage_delay() -> u64 {
    2000
}

fn default_stage_timeout() -> u64 {
    30
}

fn default_notification_timeout() -> u64 {
    5
}

fn default_webhook_base_url() -> String {
    "https://hooks.provisioning.local/workflows".to_string()
}

fn default_retention_days() -> u32 {
    30
}
