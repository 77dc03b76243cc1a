use serde::{Deserialize, Serialize};

/// A work package as it currently exists on the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetWorkItem {
    pub id: u64,
    /// Optimistic locking token required by updates.
    pub lock_version: u64,
    pub subject: String,
    /// Value of the custom field linking the item back to its source issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_key: Option<String>,
}

/// Creation/update payload produced by the translator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemPayload {
    pub subject: String,
    pub description: String,
    pub type_id: u64,
    pub status_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responsible_id: Option<u64>,
    pub source_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetAttachment {
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetComment {
    pub raw: String,
}
