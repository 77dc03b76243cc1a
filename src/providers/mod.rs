pub mod jira;
pub mod openproject;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::model::issue::{SourceIdentity, SourceIssue};
use crate::model::work_item::{TargetAttachment, TargetComment, TargetWorkItem, WorkItemPayload};

/// A failed call against the target API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("target rejected request with status {status}: {body}")]
    Rejected { status: u16, body: Value },
    #[error("target request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected target response: {0}")]
    Unexpected(Value),
    #[error("local file error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// The structured error body, if the target returned one.
    pub fn body(&self) -> Option<&Value> {
        match self {
            ApiError::Rejected { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Reads issues from the source tracker.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// All issues of a project, oldest first.
    async fn list_all(&self, project_key: &str) -> Result<Vec<SourceIssue>>;
    async fn list_specific(&self, project_key: &str, keys: &[String]) -> Result<Vec<SourceIssue>>;
    async fn watchers(&self, issue_key: &str) -> Result<Vec<SourceIdentity>>;
}

/// Moves attachment bytes from the source to local disk.
#[async_trait]
pub trait FileTransfer: Send + Sync {
    async fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

/// The target project-management service.
#[async_trait]
pub trait TargetStore: Send + Sync {
    async fn find_by_key(&self, key: &str, project_id: u64) -> Result<Option<TargetWorkItem>, ApiError>;
    async fn list_all(&self, project_id: u64) -> Result<Vec<TargetWorkItem>, ApiError>;
    async fn create(&self, project_id: u64, payload: &WorkItemPayload) -> Result<TargetWorkItem, ApiError>;
    async fn update(&self, item: &TargetWorkItem, payload: &WorkItemPayload) -> Result<TargetWorkItem, ApiError>;
    async fn grant_membership(&self, user_id: u64, project_id: u64) -> Result<(), ApiError>;
    async fn list_attachments(&self, item_id: u64) -> Result<Vec<TargetAttachment>, ApiError>;
    async fn upload_attachment(&self, item_id: u64, file: &Path, name: &str) -> Result<(), ApiError>;
    async fn list_comments(&self, item_id: u64) -> Result<Vec<TargetComment>, ApiError>;
    async fn add_comment(&self, item_id: u64, text: &str) -> Result<(), ApiError>;
    async fn add_watcher(&self, item_id: u64, user_id: u64) -> Result<(), ApiError>;
}

#[cfg(test)]
pub mod mock;

#[cfg(test)]
mod tests;
