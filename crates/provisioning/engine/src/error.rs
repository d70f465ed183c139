//! Engine error types

use provisioning_types::{JobError, JobId, Stage, TemplateId};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced synchronously by orchestrator operations
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// Template missing or configuration rejected by the catalog schema
    #[error("Validation failed: {}", errors.join("; "))]
    Validation { errors: Vec<String> },

    #[error("Template catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Secrets store error: {0}")]
    Secrets(#[from] SecretsError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProvisioningError {
    pub fn validation(errors: Vec<String>) -> Self {
        Self::Validation { errors }
    }

    pub fn template_not_found(template_id: &TemplateId) -> Self {
        Self::validation(vec![format!("Template '{}' not found", template_id)])
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Accumulated validation messages, empty for other errors
    pub fn validation_errors(&self) -> &[String] {
        match self {
            Self::Validation { errors } => errors,
            _ => &[],
        }
    }
}

/// Job store errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    /// The requested mutation was refused; the stored job is unchanged
    #[error("Update rejected: {0}")]
    Rejected(#[from] JobError),

    /// Raised by durable `JobStore` implementations; the in-memory store never fails
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Failure of a single pipeline stage
#[derive(Debug, Clone, Error)]
pub enum StageError {
    #[error("{0}")]
    Failed(String),

    #[error("Stage {stage} timed out after {after:?}")]
    Timeout { stage: Stage, after: Duration },
}

/// Template catalog errors
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("Template catalog unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid template {template_id}: {reason}")]
    InvalidTemplate {
        template_id: TemplateId,
        reason: String,
    },
}

/// Secrets store errors
#[derive(Debug, Clone, Error)]
pub enum SecretsError {
    #[error("Secrets store unavailable: {0}")]
    Unavailable(String),

    #[error("Secret rejected: {0}")]
    Rejected(String),
}

/// Notification delivery errors
#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Result type for orchestrator operations
pub type Result<T> = std::result::Result<T, ProvisioningError>;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_accumulates() {
        let err = ProvisioningError::validation(vec![
            "Field 'region' is required".into(),
            "Field 'size' must be a number".into(),
        ]);
        assert!(err.is_validation());
        assert_eq!(err.validation_errors().len(), 2);
        assert_eq!(
            err.to_string(),
            "Validation failed: Field 'region' is required; Field 'size' must be a number"
        );
    }

    #[test]
    fn test_stage_timeout_message() {
        let err = StageError::Timeout {
            stage: Stage::Testing,
            after: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "Stage testing timed out after 30s");
    }
}
