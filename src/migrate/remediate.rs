use std::collections::BTreeSet;
use std::future::Future;

use super::classify::{classify, PROPERTY_CONSTRAINT_VIOLATION};
use crate::providers::{ApiError, TargetStore};

/// The identities a single target call refers to, keyed by the attribute
/// name the target reports when it rejects them.
#[derive(Debug, Clone)]
pub struct Remediation {
    pub project_id: u64,
    identities: Vec<(&'static str, u64)>,
}

impl Remediation {
    pub fn new(project_id: u64) -> Self {
        Self {
            project_id,
            identities: Vec::new(),
        }
    }

    /// Mark `attribute` as remediable for `user`. A `None` user leaves the
    /// attribute non-remediable.
    pub fn identity(mut self, attribute: &'static str, user: Option<u64>) -> Self {
        if let Some(user) = user {
            self.identities.push((attribute, user));
        }
        self
    }

    /// Users whose missing membership explains the failure.
    fn users_to_grant(&self, err: &ApiError) -> BTreeSet<u64> {
        let Some(body) = err.body() else {
            return BTreeSet::new();
        };
        let mut users = BTreeSet::new();
        for entry in classify(body) {
            if entry.code != PROPERTY_CONSTRAINT_VIOLATION {
                continue;
            }
            let Some(attribute) = entry.attribute else {
                continue;
            };
            for (name, user) in &self.identities {
                if *name == attribute {
                    users.insert(*user);
                }
            }
        }
        users
    }
}

/// Run `operation`; if the target rejects it because a referenced user is
/// not a project member, grant membership and retry exactly once.
pub async fn run_with_remediation<T, F, Fut>(
    target: &dyn TargetStore,
    remediation: &Remediation,
    mut operation: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let err = match operation().await {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    let users = remediation.users_to_grant(&err);
    if users.is_empty() {
        return Err(err);
    }

    for user in &users {
        tracing::info!(user, project = remediation.project_id, "granting project membership");
        if let Err(e) = target.grant_membership(*user, remediation.project_id).await {
            // Already-member rejections land here too.
            tracing::warn!(user, project = remediation.project_id, error = %e, "membership grant failed");
        }
    }

    operation().await
}
