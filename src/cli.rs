use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use crate::config;
use crate::migrate::{MigrateOptions, MigrationReport, Migrator, RunSummary};
use crate::model::identity::IdentityMap;
use crate::providers::jira::JiraProvider;
use crate::providers::openproject::OpenProjectStore;

/// Migrate Jira issues into OpenProject work packages.
#[derive(Debug, Parser)]
#[command(name = "work-migrate", version)]
pub struct Cli {
    /// Jira project key, e.g. PROJ.
    pub project_key: String,
    /// OpenProject project id to migrate into.
    pub target_project: u64,
    /// Only migrate these issue keys. Repeat or separate with commas.
    #[arg(long = "issue", value_name = "KEY", value_delimiter = ',')]
    pub issues: Vec<String>,
    /// Leave work packages that already exist untouched.
    #[arg(long)]
    pub skip_updates: bool,
    /// Set the accountable user from the Jira issue creator.
    #[arg(long)]
    pub map_responsible: bool,
    /// Write the issue key -> work package id map here as JSON.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,
    /// Config file (defaults to ~/.work-migrate/config.toml).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Log at debug level.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn options(&self) -> MigrateOptions {
        MigrateOptions {
            specific_issues: (!self.issues.is_empty()).then(|| self.issues.clone()),
            skip_updates: self.skip_updates,
            map_responsible: self.map_responsible,
        }
    }
}

/// Wire the real providers together and run one migration.
pub async fn handle_migrate(cli: &Cli) -> Result<()> {
    let config = config::load_config(cli.config.as_deref())?;
    let jira = JiraProvider::new(
        config.jira.domain.clone(),
        config.jira.email.clone(),
        config.jira.api_token.clone(),
        Duration::from_secs(config.jira.timeout_secs),
    )?;
    let openproject = OpenProjectStore::new(
        &config.openproject.url,
        &config.openproject.api_key,
        config.openproject.key_custom_field.clone(),
        config.openproject.member_role_id,
        Duration::from_secs(config.openproject.timeout_secs),
    )?;

    let identities = match &config.migration.identity_map {
        Some(path) => IdentityMap::load(path)?,
        None => {
            tracing::warn!("no identity map configured, users will not be mapped");
            IdentityMap::default()
        }
    };
    tracing::info!(users = identities.len(), "loaded identity map");

    let lookups = openproject
        .load_lookups(
            &config.lookups.types,
            &config.lookups.statuses,
            &config.lookups.priorities,
        )
        .await
        .context("Failed to load OpenProject types, statuses and priorities")?;

    let migrator = Migrator::new(&jira, &openproject, &jira, &lookups, &identities)
        .with_comment_time_format(config.migration.comment_time_format.clone());
    let report = migrator
        .migrate(&cli.project_key, cli.target_project, &cli.options())
        .await;

    if let Some(path) = &cli.output {
        write_index(path, &report)?;
        println!("Wrote issue map to {}", path.display());
    }
    print_summary(&report.summary);
    Ok(())
}

fn write_index(path: &std::path::Path, report: &MigrationReport) -> Result<()> {
    let json = serde_json::to_string_pretty(&report.index)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub fn summary_lines(summary: &RunSummary) -> Vec<String> {
    vec![
        format!(
            "Processed: {} ({} created, {} updated)",
            summary.processed(),
            summary.created,
            summary.updated
        ),
        format!("Skipped:   {}", summary.skipped),
        format!("Errors:    {}", summary.errors),
    ]
}

pub fn print_summary(summary: &RunSummary) {
    println!();
    println!("Migration finished");
    for line in summary_lines(summary) {
        println!("  {line}");
    }
}
