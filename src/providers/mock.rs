//! In-memory providers for exercising the migration engine.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{ApiError, FileTransfer, SourceReader, TargetStore};
use crate::migrate::classify::{MULTIPLE_ERRORS, PROPERTY_CONSTRAINT_VIOLATION};
use crate::migrate::dedup;
use crate::model::issue::{SourceIdentity, SourceIssue};
use crate::model::work_item::{TargetAttachment, TargetComment, TargetWorkItem, WorkItemPayload};

pub fn violation(attribute: &str) -> Value {
    json!({
        "_type": "Error",
        "errorIdentifier": PROPERTY_CONSTRAINT_VIOLATION,
        "message": format!("{attribute} is not a member of the project"),
        "_embedded": { "details": { "attribute": attribute } }
    })
}

pub fn composite(errors: Vec<Value>) -> Value {
    json!({
        "_type": "Error",
        "errorIdentifier": MULTIPLE_ERRORS,
        "_embedded": { "errors": errors }
    })
}

#[derive(Default)]
pub struct TargetState {
    pub items: Vec<TargetWorkItem>,
    pub payloads: HashMap<u64, WorkItemPayload>,
    pub attachments: HashMap<u64, Vec<String>>,
    pub comments: HashMap<u64, Vec<String>>,
    pub watchers: HashMap<u64, Vec<u64>>,
    pub members: HashSet<u64>,
    /// `(user, project)` per membership grant.
    pub grants: Vec<(u64, u64)>,
    pub calls: Vec<String>,
    next_id: u64,
}

/// A target that rejects users outside its member set, like OpenProject
/// does for assignees and watchers.
#[derive(Default)]
pub struct MockTarget {
    state: Mutex<TargetState>,
    gated_users: HashSet<u64>,
    /// Call name -> (remaining rejections, error body).
    failures: Mutex<HashMap<String, (usize, Value)>>,
}

impl MockTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// These users are rejected until they are granted membership.
    pub fn requiring_membership(users: &[u64]) -> Self {
        Self {
            gated_users: users.iter().copied().collect(),
            ..Self::default()
        }
    }

    /// Reject the next `times` calls named `call` with a 422 carrying `body`.
    pub fn with_failure(self, call: &str, times: usize, body: Value) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(call.to_string(), (times, body));
        self
    }

    pub fn state(&self) -> MutexGuard<'_, TargetState> {
        self.state.lock().unwrap()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.state().calls.iter().filter(|c| *c == name).count()
    }

    /// Pre-populate an item as if a previous run had created it.
    pub fn seed(&self, key: &str, attachments: &[&str], comments: &[&str]) -> u64 {
        let mut state = self.state();
        state.next_id += 1;
        let id = state.next_id;
        state.items.push(TargetWorkItem {
            id,
            lock_version: 1,
            subject: format!("seeded {key}"),
            source_key: Some(key.to_string()),
        });
        state
            .attachments
            .insert(id, attachments.iter().map(|a| a.to_string()).collect());
        state
            .comments
            .insert(id, comments.iter().map(|c| c.to_string()).collect());
        id
    }

    fn record(&self, call: &str) -> Result<(), ApiError> {
        self.state().calls.push(call.to_string());
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(call) {
            Some((remaining, body)) if *remaining > 0 => {
                *remaining -= 1;
                Err(ApiError::Rejected {
                    status: 422,
                    body: body.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    fn reject_non_members(&self, refs: &[(&str, Option<u64>)]) -> Result<(), ApiError> {
        let state = self.state();
        let errors: Vec<Value> = refs
            .iter()
            .filter_map(|(attribute, user)| {
                let user = (*user)?;
                (self.gated_users.contains(&user) && !state.members.contains(&user))
                    .then(|| violation(attribute))
            })
            .collect();
        match errors.len() {
            0 => Ok(()),
            1 => Err(ApiError::Rejected {
                status: 422,
                body: errors.into_iter().next().unwrap_or_default(),
            }),
            _ => Err(ApiError::Rejected {
                status: 422,
                body: composite(errors),
            }),
        }
    }
}

#[async_trait]
impl TargetStore for MockTarget {
    async fn find_by_key(&self, key: &str, _project_id: u64) -> Result<Option<TargetWorkItem>, ApiError> {
        self.record("find_by_key")?;
        Ok(dedup::find_work_item(key, &self.state().items).cloned())
    }

    async fn list_all(&self, _project_id: u64) -> Result<Vec<TargetWorkItem>, ApiError> {
        self.record("list_all")?;
        Ok(self.state().items.clone())
    }

    async fn create(&self, _project_id: u64, payload: &WorkItemPayload) -> Result<TargetWorkItem, ApiError> {
        self.record("create")?;
        self.reject_non_members(&[
            ("assignee", payload.assignee_id),
            ("responsible", payload.responsible_id),
        ])?;
        let mut state = self.state();
        state.next_id += 1;
        let item = TargetWorkItem {
            id: state.next_id,
            lock_version: 0,
            subject: payload.subject.clone(),
            source_key: Some(payload.source_key.clone()),
        };
        state.items.push(item.clone());
        state.payloads.insert(item.id, payload.clone());
        Ok(item)
    }

    async fn update(&self, item: &TargetWorkItem, payload: &WorkItemPayload) -> Result<TargetWorkItem, ApiError> {
        self.record("update")?;
        let mut state = self.state();
        let stored = state
            .items
            .iter_mut()
            .find(|i| i.id == item.id)
            .ok_or_else(|| ApiError::Rejected {
                status: 404,
                body: json!({"_type": "Error", "errorIdentifier": "urn:openproject-org:api:v3:errors:NotFound"}),
            })?;
        stored.lock_version += 1;
        stored.subject = payload.subject.clone();
        let updated = stored.clone();
        state.payloads.insert(item.id, payload.clone());
        Ok(updated)
    }

    async fn grant_membership(&self, user_id: u64, project_id: u64) -> Result<(), ApiError> {
        self.record("grant_membership")?;
        let mut state = self.state();
        state.members.insert(user_id);
        state.grants.push((user_id, project_id));
        Ok(())
    }

    async fn list_attachments(&self, item_id: u64) -> Result<Vec<TargetAttachment>, ApiError> {
        self.record("list_attachments")?;
        Ok(self
            .state()
            .attachments
            .get(&item_id)
            .into_iter()
            .flatten()
            .map(|name| TargetAttachment {
                file_name: name.clone(),
            })
            .collect())
    }

    async fn upload_attachment(&self, item_id: u64, file: &Path, name: &str) -> Result<(), ApiError> {
        self.record("upload_attachment")?;
        std::fs::metadata(file)?;
        self.state()
            .attachments
            .entry(item_id)
            .or_default()
            .push(name.to_string());
        Ok(())
    }

    async fn list_comments(&self, item_id: u64) -> Result<Vec<TargetComment>, ApiError> {
        self.record("list_comments")?;
        Ok(self
            .state()
            .comments
            .get(&item_id)
            .into_iter()
            .flatten()
            .map(|raw| TargetComment { raw: raw.clone() })
            .collect())
    }

    async fn add_comment(&self, item_id: u64, text: &str) -> Result<(), ApiError> {
        self.record("add_comment")?;
        self.state()
            .comments
            .entry(item_id)
            .or_default()
            .push(text.to_string());
        Ok(())
    }

    async fn add_watcher(&self, item_id: u64, user_id: u64) -> Result<(), ApiError> {
        self.record("add_watcher")?;
        self.reject_non_members(&[("user", Some(user_id))])?;
        self.state()
            .watchers
            .entry(item_id)
            .or_default()
            .push(user_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockSource {
    pub issues: Vec<SourceIssue>,
    pub fail_listing: bool,
    pub watchers: HashMap<String, Vec<SourceIdentity>>,
    pub watcher_requests: Mutex<Vec<String>>,
}

impl MockSource {
    pub fn new(issues: Vec<SourceIssue>) -> Self {
        Self {
            issues,
            ..Self::default()
        }
    }

    pub fn with_watchers(mut self, key: &str, watchers: Vec<SourceIdentity>) -> Self {
        self.watchers.insert(key.to_string(), watchers);
        self
    }
}

#[async_trait]
impl SourceReader for MockSource {
    async fn list_all(&self, _project_key: &str) -> Result<Vec<SourceIssue>> {
        if self.fail_listing {
            anyhow::bail!("Mock listing failure");
        }
        Ok(self.issues.clone())
    }

    async fn list_specific(&self, _project_key: &str, keys: &[String]) -> Result<Vec<SourceIssue>> {
        Ok(self
            .issues
            .iter()
            .filter(|i| keys.contains(&i.key))
            .cloned()
            .collect())
    }

    async fn watchers(&self, issue_key: &str) -> Result<Vec<SourceIdentity>> {
        self.watcher_requests
            .lock()
            .unwrap()
            .push(issue_key.to_string());
        Ok(self.watchers.get(issue_key).cloned().unwrap_or_default())
    }
}

/// Writes a placeholder body for every download and remembers the paths.
#[derive(Default)]
pub struct MockTransfer {
    pub downloads: Mutex<Vec<(String, std::path::PathBuf)>>,
}

#[async_trait]
impl FileTransfer for MockTransfer {
    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        std::fs::write(dest, format!("bytes of {url}"))?;
        self.downloads
            .lock()
            .unwrap()
            .push((url.to_string(), dest.to_path_buf()));
        Ok(())
    }
}
