use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::migrate::engine::DEFAULT_COMMENT_TIME_FORMAT;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub jira: JiraConfig,
    pub openproject: OpenProjectConfig,
    #[serde(default)]
    pub migration: MigrationConfig,
    #[serde(default)]
    pub lookups: LookupAliases,
}

#[derive(Debug, Deserialize)]
pub struct JiraConfig {
    pub domain: String,
    pub email: String,
    pub api_token: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct OpenProjectConfig {
    pub url: String,
    pub api_key: String,
    /// Custom field holding the Jira key, e.g. `customField1`.
    #[serde(default = "default_key_field")]
    pub key_custom_field: String,
    /// Role given to users added to a project during remediation.
    #[serde(default = "default_member_role")]
    pub member_role_id: u64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct MigrationConfig {
    /// JSON file mapping Jira account ids to OpenProject user ids.
    pub identity_map: Option<PathBuf>,
    #[serde(default = "default_time_format")]
    pub comment_time_format: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            identity_map: None,
            comment_time_format: default_time_format(),
        }
    }
}

/// Source name -> target name, for values that are named differently.
#[derive(Debug, Deserialize, Default)]
pub struct LookupAliases {
    #[serde(default)]
    pub types: HashMap<String, String>,
    #[serde(default)]
    pub statuses: HashMap<String, String>,
    #[serde(default)]
    pub priorities: HashMap<String, String>,
}

fn default_key_field() -> String {
    "customField1".into()
}

fn default_member_role() -> u64 {
    3
}

fn default_time_format() -> String {
    DEFAULT_COMMENT_TIME_FORMAT.into()
}

fn default_timeout() -> u64 {
    60
}

pub fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".work-migrate")
        .join("config.toml")
}

pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).with_context(|| "Failed to parse config.toml")
}

pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_path);
    if !path.exists() {
        bail!(
            "No config found at {}. Add [jira] and [openproject] credentials there.",
            path.display()
        );
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    parse_config(&contents)
}
