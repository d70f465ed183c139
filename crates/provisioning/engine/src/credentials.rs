//! Credential extraction
//!
//! Configuration entries whose key looks like a secret are split off and
//! handed to the secrets store. Classification is by key name only.

use provisioning_types::Configuration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of credential inferred from a configuration key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    PrivateKey,
    Password,
    ApiKey,
    Token,
    Secret,
}

// Checked in order against the normalized key.
const KEY_PATTERNS: &[(&str, CredentialKind)] = &[
    ("privatekey", CredentialKind::PrivateKey),
    ("sshkey", CredentialKind::PrivateKey),
    ("password", CredentialKind::Password),
    ("passwd", CredentialKind::Password),
    ("passphrase", CredentialKind::Password),
    ("apikey", CredentialKind::ApiKey),
    ("accesskey", CredentialKind::ApiKey),
    ("token", CredentialKind::Token),
    ("bearer", CredentialKind::Token),
    ("secret", CredentialKind::Secret),
    ("credential", CredentialKind::Secret),
];

/// Classify a configuration key, ignoring case and separators
pub fn classify_key(key: &str) -> Option<CredentialKind> {
    let normalized: String = key
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    KEY_PATTERNS
        .iter()
        .find(|(pattern, _)| normalized.contains(*pattern))
        .map(|(_, kind)| *kind)
}

/// Credential-shaped subset of a configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedCredentials {
    pub secrets: BTreeMap<String, String>,
    pub kinds: BTreeMap<String, CredentialKind>,
}

impl ExtractedCredentials {
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }
}

/// Extract credential-shaped entries; null and empty values are skipped
pub fn extract_credentials(configuration: &Configuration) -> ExtractedCredentials {
    let mut extracted = ExtractedCredentials::default();

    for (key, value) in configuration {
        let Some(kind) = classify_key(key) else {
            continue;
        };
        let value = match value {
            serde_json::Value::Null => continue,
            serde_json::Value::String(s) if s.is_empty() => continue,
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        extracted.secrets.insert(key.clone(), value);
        extracted.kinds.insert(key.clone(), kind);
    }

    extracted
}
