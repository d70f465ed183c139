//! Callers of ownership-checked operations

use crate::{Job, UserId};
use serde::{Deserialize, Serialize};

/// Who is asking. Admins may act on any job; users only on their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    #[serde(default)]
    pub is_admin: bool,
}

impl Actor {
    pub fn user(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            is_admin: false,
        }
    }

    pub fn admin(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            is_admin: true,
        }
    }

    pub fn may_act_on(&self, job: &Job) -> bool {
        self.is_admin || job.is_owned_by(&self.user_id)
    }
}

impl From<UserId> for Actor {
    fn from(user_id: UserId) -> Self {
        Self::user(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Configuration, TemplateId, WorkflowId};
    use chrono::Utc;

    #[test]
    fn test_ownership() {
        let job = Job::new(
            UserId::new("u1"),
            WorkflowId::new("wf1"),
            TemplateId::new("t"),
            Configuration::new(),
            &[],
            Utc::now(),
        );
        assert!(Actor::user("u1").may_act_on(&job));
        assert!(!Actor::user("u2").may_act_on(&job));
        assert!(Actor::admin("ops").may_act_on(&job));
    }
}
