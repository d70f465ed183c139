//! Configuration for provisiond

use provisioning_engine::{FieldSchema, FieldType, ProvisioningConfig, TemplateDefinition};
use serde::{Deserialize, Serialize};

/// Main daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Orchestrator and background loop tuning
    #[serde(default)]
    pub provisioning: ProvisioningConfig,

    /// Stage executor configuration
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Templates registered in the catalog at startup
    #[serde(default = "default_templates")]
    pub templates: Vec<TemplateDefinition>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            provisioning: ProvisioningConfig::default(),
            executor: ExecutorConfig::default(),
            templates: default_templates(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Stage executor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Probability that a simulated stage fails
    #[serde(default = "default_failure_rate")]
    pub failure_rate: f64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            failure_rate: default_failure_rate(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_failure_rate() -> f64 {
    0.0
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Built-in catalog used when no templates are configured
fn default_templates() -> Vec<TemplateDefinition> {
    vec![
        TemplateDefinition::new("web-service", "Web Service")
            .with_dependencies(&["validation", "provisioning"])
            .with_field(
                FieldSchema::new("region", FieldType::String)
                    .required()
                    .with_pattern("^[a-z]{2}(-[a-z]+-[0-9])?$"),
            )
            .with_field(FieldSchema::new("replicas", FieldType::Integer).with_range(Some(1.0), Some(10.0)))
            .with_field(FieldSchema::new("apiKey", FieldType::String))
            .with_estimated_duration(30),
        TemplateDefinition::new("data-pipeline", "Data Pipeline")
            .with_dependencies(&["validation", "storage", "provisioning"])
            .with_field(
                FieldSchema::new("tier", FieldType::String)
                    .required()
                    .with_allowed(&["free", "standard", "premium"]),
            )
            .with_field(FieldSchema::new("databasePassword", FieldType::String)),
    ]
}

impl DaemonConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // PROVISION_PROVISIONING__MAX_CONCURRENT_JOBS=5
        builder = builder.add_source(
            config::Environment::with_prefix("PROVISION")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: DaemonConfig = builder.build()?.try_deserialize()?;
        config
            .provisioning
            .validate()
            .map_err(config::ConfigError::Message)?;
        Ok(config)
    }
}
