use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer};

use super::{FileTransfer, SourceReader};
use crate::model::issue::{SourceAttachment, SourceComment, SourceIdentity, SourceIssue};

const FIELDS: &[&str] = &[
    "summary",
    "description",
    "issuetype",
    "status",
    "priority",
    "creator",
    "assignee",
    "attachment",
    "comment",
    "watches",
    "created",
];

const PAGE_SIZE: u32 = 100;

pub struct JiraProvider {
    base_url: String,
    auth_header: String,
    client: reqwest::Client,
}

impl JiraProvider {
    pub fn new(domain: String, email: String, api_token: String, timeout: Duration) -> Result<Self> {
        let creds = format!("{email}:{api_token}");
        let encoded = base64::engine::general_purpose::STANDARD.encode(creds);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Jira HTTP client")?;
        Ok(Self {
            base_url: format!("https://{domain}.atlassian.net"),
            auth_header: format!("Basic {encoded}"),
            client,
        })
    }

    async fn search(&self, jql: &str) -> Result<Vec<SourceIssue>> {
        let url = format!("{}/rest/api/3/search/jql", self.base_url);
        let mut issues = Vec::new();
        let mut next_page_token: Option<String> = None;

        loop {
            let mut body = serde_json::json!({
                "jql": jql,
                "fields": FIELDS,
                "maxResults": PAGE_SIZE,
            });
            if let Some(token) = &next_page_token {
                body["nextPageToken"] = serde_json::Value::String(token.clone());
            }

            let resp = self
                .client
                .post(&url)
                .header("Authorization", &self.auth_header)
                .header("Accept", "application/json")
                .json(&body)
                .send()
                .await
                .context("Jira API request failed")?;
            if !resp.status().is_success() {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                bail!("Jira search failed with {status}: {text}");
            }

            let page: SearchResponse = resp.json().await.context("Failed to parse Jira response")?;
            tracing::debug!(count = page.issues.len(), "fetched Jira page");
            next_page_token = page.next_page().map(String::from);
            issues.extend(page.issues.into_iter().map(JiraIssue::into_source));
            if next_page_token.is_none() {
                break;
            }
        }

        Ok(issues)
    }
}

/// JQL selecting a project's issues oldest first, optionally restricted to keys.
pub fn build_jql(project_key: &str, keys: Option<&[String]>) -> String {
    match keys {
        Some(keys) => format!(
            "project = \"{project_key}\" AND key in ({}) ORDER BY created ASC",
            keys.join(", ")
        ),
        None => format!("project = \"{project_key}\" ORDER BY created ASC"),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchResponse {
    pub(crate) issues: Vec<JiraIssue>,
    #[serde(default)]
    next_page_token: Option<String>,
    #[serde(default)]
    is_last: Option<bool>,
}

impl SearchResponse {
    /// Token for the following page. Only an explicit `isLast: true` ends
    /// pagination while a token is present.
    pub(crate) fn next_page(&self) -> Option<&str> {
        if self.is_last == Some(true) {
            return None;
        }
        self.next_page_token.as_deref()
    }
}

#[derive(Deserialize)]
pub(crate) struct JiraIssue {
    key: String,
    fields: IssueFields,
}

#[derive(Deserialize)]
struct IssueFields {
    summary: Option<String>,
    description: Option<serde_json::Value>,
    issuetype: NamedField,
    status: NamedField,
    priority: Option<NamedField>,
    creator: Option<User>,
    assignee: Option<User>,
    #[serde(default)]
    attachment: Vec<Attachment>,
    comment: Option<CommentPage>,
    watches: Option<Watches>,
    #[serde(deserialize_with = "jira_timestamp")]
    created: DateTime<FixedOffset>,
}

#[derive(Deserialize)]
struct NamedField {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct User {
    account_id: String,
    #[serde(default)]
    display_name: String,
}

#[derive(Deserialize)]
struct Attachment {
    filename: String,
    content: String,
}

#[derive(Deserialize)]
struct CommentPage {
    #[serde(default)]
    comments: Vec<Comment>,
}

#[derive(Deserialize)]
struct Comment {
    author: User,
    body: Option<serde_json::Value>,
    #[serde(deserialize_with = "jira_timestamp")]
    created: DateTime<FixedOffset>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Watches {
    watch_count: u32,
}

#[derive(Deserialize)]
struct WatchersResponse {
    #[serde(default)]
    watchers: Vec<User>,
}

/// Jira timestamps look like `2023-01-05T10:00:00.000+0100`.
fn jira_timestamp<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    DateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(&raw))
        .map_err(serde::de::Error::custom)
}

impl From<User> for SourceIdentity {
    fn from(user: User) -> Self {
        SourceIdentity {
            account_id: user.account_id,
            display_name: user.display_name,
        }
    }
}

impl JiraIssue {
    pub(crate) fn into_source(self) -> SourceIssue {
        let fields = self.fields;
        SourceIssue {
            key: self.key,
            summary: fields.summary.unwrap_or_default(),
            description: fields.description.filter(|d| !d.is_null()),
            issue_type: fields.issuetype.name,
            status: fields.status.name,
            priority: fields.priority.map(|p| p.name),
            creator: fields.creator.map(Into::into),
            assignee: fields.assignee.map(Into::into),
            created: fields.created,
            attachments: fields
                .attachment
                .into_iter()
                .map(|a| SourceAttachment {
                    filename: a.filename,
                    content_url: a.content,
                })
                .collect(),
            comments: fields
                .comment
                .map(|page| page.comments)
                .unwrap_or_default()
                .into_iter()
                .map(|c| SourceComment {
                    author: c.author.into(),
                    body: c.body,
                    created: c.created,
                })
                .collect(),
            watch_count: fields.watches.map(|w| w.watch_count).unwrap_or(0),
        }
    }
}

#[async_trait]
impl SourceReader for JiraProvider {
    async fn list_all(&self, project_key: &str) -> Result<Vec<SourceIssue>> {
        self.search(&build_jql(project_key, None)).await
    }

    async fn list_specific(&self, project_key: &str, keys: &[String]) -> Result<Vec<SourceIssue>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        self.search(&build_jql(project_key, Some(keys))).await
    }

    async fn watchers(&self, issue_key: &str) -> Result<Vec<SourceIdentity>> {
        let url = format!(
            "{}/rest/api/3/issue/{}/watchers",
            self.base_url,
            urlencoding::encode(issue_key)
        );
        let resp: WatchersResponse = self
            .client
            .get(&url)
            .header("Authorization", &self.auth_header)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Jira watchers request failed")?
            .error_for_status()
            .with_context(|| format!("Jira refused watchers of {issue_key}"))?
            .json()
            .await
            .context("Failed to parse Jira watchers")?;

        Ok(resp.watchers.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl FileTransfer for JiraProvider {
    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let bytes = self
            .client
            .get(url)
            .header("Authorization", &self.auth_header)
            .send()
            .await
            .context("Jira attachment request failed")?
            .error_for_status()
            .with_context(|| format!("Jira refused attachment download {url}"))?
            .bytes()
            .await
            .context("Failed to read attachment body")?;

        tokio::fs::write(dest, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", dest.display()))?;
        Ok(())
    }
}
