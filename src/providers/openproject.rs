use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};

use super::{ApiError, TargetStore};
use crate::lookup::{LookupTables, Table};
use crate::migrate::dedup;
use crate::model::work_item::{TargetAttachment, TargetComment, TargetWorkItem, WorkItemPayload};

const API: &str = "/api/v3";
const PAGE_SIZE: usize = 500;

pub struct OpenProjectStore {
    base_url: String,
    auth_header: String,
    key_field: String,
    member_role_id: u64,
    client: reqwest::Client,
}

impl OpenProjectStore {
    pub fn new(
        url: &str,
        api_key: &str,
        key_field: String,
        member_role_id: u64,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(format!("apikey:{api_key}"));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build OpenProject HTTP client")?;
        Ok(Self {
            base_url: url.trim_end_matches('/').to_string(),
            auth_header: format!("Basic {encoded}"),
            key_field,
            member_role_id,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{API}{path}", self.base_url)
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<Value, ApiError> {
        let resp = req
            .header("Authorization", &self.auth_header)
            .header("Accept", "application/hal+json")
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        if status.is_success() {
            Ok(body)
        } else {
            Err(ApiError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ApiError> {
        self.send(self.client.get(self.url(path)).query(query)).await
    }

    /// Fetch every page of a work package collection.
    async fn work_packages(&self, project_id: u64, filters: Value) -> Result<Vec<TargetWorkItem>, ApiError> {
        let path = format!("/projects/{project_id}/work_packages");
        let mut items = Vec::new();
        let mut offset = 1;
        loop {
            let page = self
                .get(
                    &path,
                    &[
                        ("filters", filters.to_string()),
                        ("pageSize", PAGE_SIZE.to_string()),
                        ("offset", offset.to_string()),
                    ],
                )
                .await?;
            let elements = embedded_elements(&page);
            items.extend(elements.iter().filter_map(|e| parse_work_item(e, &self.key_field)));

            let total = page.get("total").and_then(Value::as_u64).unwrap_or(0) as usize;
            if elements.is_empty() || items.len() >= total {
                break;
            }
            offset += 1;
        }
        Ok(items)
    }

    async fn catalog(&self, path: &str) -> Result<Vec<(String, u64)>, ApiError> {
        let body = self.get(path, &[]).await?;
        Ok(embedded_elements(&body)
            .iter()
            .filter_map(|e| {
                let name = e.get("name")?.as_str()?.to_string();
                let id = e.get("id")?.as_u64()?;
                Some((name, id))
            })
            .collect())
    }

    /// Build lookup tables from the target's type, status and priority
    /// catalogs, applying name aliases from configuration.
    pub async fn load_lookups(
        &self,
        types: &HashMap<String, String>,
        statuses: &HashMap<String, String>,
        priorities: &HashMap<String, String>,
    ) -> Result<LookupTables, ApiError> {
        Ok(LookupTables {
            types: Table::new(self.catalog("/types").await?).with_aliases(types),
            statuses: Table::new(self.catalog("/statuses").await?).with_aliases(statuses),
            priorities: Table::new(self.catalog("/priorities").await?).with_aliases(priorities),
        })
    }
}

fn embedded_elements(body: &Value) -> &[Value] {
    body.pointer("/_embedded/elements")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn user_link(id: u64) -> Value {
    json!({ "href": format!("{API}/users/{id}") })
}

/// Parse a work package HAL resource.
pub fn parse_work_item(element: &Value, key_field: &str) -> Option<TargetWorkItem> {
    Some(TargetWorkItem {
        id: element.get("id")?.as_u64()?,
        lock_version: element.get("lockVersion").and_then(Value::as_u64).unwrap_or(0),
        subject: element
            .get("subject")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        source_key: element
            .get(key_field)
            .and_then(Value::as_str)
            .map(String::from),
    })
}

/// Serialize a payload into an OpenProject work package body.
pub fn payload_body(payload: &WorkItemPayload, key_field: &str, lock_version: Option<u64>) -> Value {
    let mut links = serde_json::Map::new();
    links.insert("type".into(), json!({ "href": format!("{API}/types/{}", payload.type_id) }));
    links.insert("status".into(), json!({ "href": format!("{API}/statuses/{}", payload.status_id) }));
    if let Some(id) = payload.priority_id {
        links.insert("priority".into(), json!({ "href": format!("{API}/priorities/{id}") }));
    }
    if let Some(id) = payload.assignee_id {
        links.insert("assignee".into(), user_link(id));
    }
    if let Some(id) = payload.responsible_id {
        links.insert("responsible".into(), user_link(id));
    }

    let mut body = json!({
        "subject": payload.subject,
        "description": { "format": "markdown", "raw": payload.description },
        "_links": links,
    });
    body[key_field] = Value::String(payload.source_key.clone());
    if let Some(lock_version) = lock_version {
        body["lockVersion"] = json!(lock_version);
    }
    body
}

#[async_trait]
impl TargetStore for OpenProjectStore {
    async fn find_by_key(&self, key: &str, project_id: u64) -> Result<Option<TargetWorkItem>, ApiError> {
        let mut key_filter = serde_json::Map::new();
        key_filter.insert(
            self.key_field.clone(),
            json!({ "operator": "~", "values": [key] }),
        );
        let filters = json!([{ "status": { "operator": "*", "values": [] } }, key_filter]);
        let candidates = self.work_packages(project_id, filters).await?;
        Ok(dedup::find_work_item(key, &candidates).cloned())
    }

    async fn list_all(&self, project_id: u64) -> Result<Vec<TargetWorkItem>, ApiError> {
        self.work_packages(project_id, json!([])).await
    }

    async fn create(&self, project_id: u64, payload: &WorkItemPayload) -> Result<TargetWorkItem, ApiError> {
        let body = payload_body(payload, &self.key_field, None);
        let created = self
            .send(
                self.client
                    .post(self.url(&format!("/projects/{project_id}/work_packages")))
                    .json(&body),
            )
            .await?;
        parse_work_item(&created, &self.key_field).ok_or(ApiError::Unexpected(created))
    }

    async fn update(&self, item: &TargetWorkItem, payload: &WorkItemPayload) -> Result<TargetWorkItem, ApiError> {
        let body = payload_body(payload, &self.key_field, Some(item.lock_version));
        let updated = self
            .send(
                self.client
                    .patch(self.url(&format!("/work_packages/{}", item.id)))
                    .json(&body),
            )
            .await?;
        parse_work_item(&updated, &self.key_field).ok_or(ApiError::Unexpected(updated))
    }

    async fn grant_membership(&self, user_id: u64, project_id: u64) -> Result<(), ApiError> {
        let body = json!({
            "_links": {
                "project": { "href": format!("{API}/projects/{project_id}") },
                "principal": user_link(user_id),
                "roles": [{ "href": format!("{API}/roles/{}", self.member_role_id) }],
            }
        });
        self.send(self.client.post(self.url("/memberships")).json(&body))
            .await?;
        Ok(())
    }

    async fn list_attachments(&self, item_id: u64) -> Result<Vec<TargetAttachment>, ApiError> {
        let body = self
            .get(&format!("/work_packages/{item_id}/attachments"), &[])
            .await?;
        Ok(embedded_elements(&body)
            .iter()
            .filter_map(|e| e.get("fileName").and_then(Value::as_str))
            .map(|name| TargetAttachment {
                file_name: name.to_string(),
            })
            .collect())
    }

    async fn upload_attachment(&self, item_id: u64, file: &Path, name: &str) -> Result<(), ApiError> {
        let bytes = tokio::fs::read(file).await?;
        let metadata = json!({ "fileName": name }).to_string();
        let form = reqwest::multipart::Form::new()
            .text("metadata", metadata)
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(name.to_string()),
            );
        self.send(
            self.client
                .post(self.url(&format!("/work_packages/{item_id}/attachments")))
                .multipart(form),
        )
        .await?;
        Ok(())
    }

    async fn list_comments(&self, item_id: u64) -> Result<Vec<TargetComment>, ApiError> {
        let body = self
            .get(&format!("/work_packages/{item_id}/activities"), &[])
            .await?;
        Ok(embedded_elements(&body)
            .iter()
            .filter_map(|e| e.pointer("/comment/raw").and_then(Value::as_str))
            .filter(|raw| !raw.is_empty())
            .map(|raw| TargetComment {
                raw: raw.to_string(),
            })
            .collect())
    }

    async fn add_comment(&self, item_id: u64, text: &str) -> Result<(), ApiError> {
        let body = json!({ "comment": { "raw": text } });
        self.send(
            self.client
                .post(self.url(&format!("/work_packages/{item_id}/activities")))
                .query(&[("notify", "false")])
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn add_watcher(&self, item_id: u64, user_id: u64) -> Result<(), ApiError> {
        let body = json!({ "user": user_link(user_id) });
        self.send(
            self.client
                .post(self.url(&format!("/work_packages/{item_id}/watchers")))
                .json(&body),
        )
        .await?;
        Ok(())
    }
}
