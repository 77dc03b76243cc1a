use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A user as seen by the source tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceIdentity {
    pub account_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAttachment {
    pub filename: String,
    pub content_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceComment {
    pub author: SourceIdentity,
    /// Atlassian Document Format body.
    pub body: Option<Value>,
    pub created: DateTime<FixedOffset>,
}

/// An issue fetched from the source tracker. Immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceIssue {
    pub key: String,
    pub summary: String,
    /// Atlassian Document Format description.
    pub description: Option<Value>,
    pub issue_type: String,
    pub status: String,
    pub priority: Option<String>,
    pub creator: Option<SourceIdentity>,
    pub assignee: Option<SourceIdentity>,
    /// Creation time with the offset the source reported, so rendered
    /// timestamps stay stable across runs.
    pub created: DateTime<FixedOffset>,
    #[serde(default)]
    pub attachments: Vec<SourceAttachment>,
    #[serde(default)]
    pub comments: Vec<SourceComment>,
    /// Watcher identities are fetched lazily, only when this is nonzero.
    pub watch_count: u32,
}
