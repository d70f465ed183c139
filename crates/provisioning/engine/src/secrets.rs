//! Secrets store collaborator
//!
//! Receives the credential-shaped subset of a configuration once per
//! provisioning request, keyed by `(user, workflow)`.

use crate::credentials::CredentialKind;
use crate::error::SecretsError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use provisioning_types::{JobId, SecretId, TemplateId, UserId, WorkflowId};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// Context recorded alongside stored secrets
#[derive(Debug, Clone, PartialEq)]
pub struct SecretMetadata {
    pub job_id: JobId,
    pub template_id: TemplateId,
    pub kinds: BTreeMap<String, CredentialKind>,
}

#[async_trait]
pub trait SecretsStore: Send + Sync {
    /// Persist secrets and return one reference per stored entry
    async fn store_secrets(
        &self,
        user_id: &UserId,
        workflow_id: &WorkflowId,
        secrets: BTreeMap<String, String>,
        metadata: SecretMetadata,
    ) -> Result<Vec<SecretId>, SecretsError>;
}

/// A stored secret value
#[derive(Debug, Clone)]
pub struct SecretRecord {
    pub id: SecretId,
    pub user_id: UserId,
    pub workflow_id: WorkflowId,
    pub key: String,
    pub value: String,
    pub kind: Option<CredentialKind>,
    pub job_id: JobId,
    pub stored_at: DateTime<Utc>,
}

/// In-process secrets store for development and testing
#[derive(Debug, Default)]
pub struct InMemorySecretsStore {
    records: RwLock<HashMap<SecretId, SecretRecord>>,
}

impl InMemorySecretsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All secrets stored for a user's workflow
    pub async fn secrets_for(&self, user_id: &UserId, workflow_id: &WorkflowId) -> Vec<SecretRecord> {
        let records = self.records.read().await;
        records
            .values()
            .filter(|r| &r.user_id == user_id && &r.workflow_id == workflow_id)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SecretsStore for InMemorySecretsStore {
    async fn store_secrets(
        &self,
        user_id: &UserId,
        workflow_id: &WorkflowId,
        secrets: BTreeMap<String, String>,
        metadata: SecretMetadata,
    ) -> Result<Vec<SecretId>, SecretsError> {
        let now = Utc::now();
        let mut records = self.records.write().await;
        let mut ids = Vec::with_capacity(secrets.len());

        for (key, value) in secrets {
            let id = SecretId::new(format!("secret-{}", uuid::Uuid::new_v4()));
            records.insert(
                id.clone(),
                SecretRecord {
                    id: id.clone(),
                    user_id: user_id.clone(),
                    workflow_id: workflow_id.clone(),
                    kind: metadata.kinds.get(&key).copied(),
                    key,
                    value,
                    job_id: metadata.job_id.clone(),
                    stored_at: now,
                },
            );
            ids.push(id);
        }

        Ok(ids)
    }
}
