//! Strongly-typed identifiers for provisioning entities
//!
//! Job ids are UUID-based; the foreign references supplied by callers
//! (users, workflows, templates) are opaque strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a provisioning job
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a job id from its display form
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Tenant user that owns a job
    UserId
);
string_id!(
    /// Workflow being provisioned
    WorkflowId
);
string_id!(
    /// Catalog template the workflow is instantiated from
    TemplateId
);
string_id!(
    /// Reference to a value held by the secrets store
    SecretId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_generation() {
        let id1 = JobId::generate();
        let id2 = JobId::generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_job_id_parse_roundtrip() {
        let id = JobId::generate();
        assert_eq!(JobId::parse(&id.to_string()), Some(id));
        assert_eq!(JobId::parse("not-a-uuid"), None);
    }

    #[test]
    fn test_string_ids_serialize_transparently() {
        let user = UserId::new("u1");
        assert_eq!(serde_json::to_string(&user).unwrap(), "\"u1\"");
        assert_eq!(format!("{}", TemplateId::from("tmplA")), "tmplA");
    }
}
