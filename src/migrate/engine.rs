use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};

use super::dedup::{attachment_exists, comment_exists, render_comment};
use super::remediate::{run_with_remediation, Remediation};
use super::translate::translate;
use super::{MigrateError, MigrateOptions, MigrationReport, RunSummary};
use crate::lookup::Lookups;
use crate::model::identity::IdentityMap;
use crate::model::issue::SourceIssue;
use crate::model::work_item::{TargetAttachment, TargetComment, TargetWorkItem};
use crate::providers::{FileTransfer, SourceReader, TargetStore};
use crate::util::adf::render_or_empty;

pub const DEFAULT_COMMENT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueOutcome {
    Created(u64),
    Updated(u64),
    Skipped(u64),
}

impl IssueOutcome {
    pub fn item_id(&self) -> u64 {
        match *self {
            IssueOutcome::Created(id) | IssueOutcome::Updated(id) | IssueOutcome::Skipped(id) => id,
        }
    }
}

impl RunSummary {
    fn record(&mut self, outcome: IssueOutcome) {
        match outcome {
            IssueOutcome::Created(_) => self.created += 1,
            IssueOutcome::Updated(_) => self.updated += 1,
            IssueOutcome::Skipped(_) => self.skipped += 1,
        }
    }
}

/// Drives a migration run: one issue at a time, oldest first.
pub struct Migrator<'a> {
    source: &'a dyn SourceReader,
    target: &'a dyn TargetStore,
    transfer: &'a dyn FileTransfer,
    lookups: &'a dyn Lookups,
    identities: &'a IdentityMap,
    comment_time_format: String,
}

impl<'a> Migrator<'a> {
    pub fn new(
        source: &'a dyn SourceReader,
        target: &'a dyn TargetStore,
        transfer: &'a dyn FileTransfer,
        lookups: &'a dyn Lookups,
        identities: &'a IdentityMap,
    ) -> Self {
        Self {
            source,
            target,
            transfer,
            lookups,
            identities,
            comment_time_format: DEFAULT_COMMENT_TIME_FORMAT.to_string(),
        }
    }

    pub fn with_comment_time_format(mut self, format: impl Into<String>) -> Self {
        self.comment_time_format = format.into();
        self
    }

    /// Migrate a project. The run always completes with a report; failures
    /// are logged and counted, never propagated.
    pub async fn migrate(
        &self,
        project_key: &str,
        target_project: u64,
        options: &MigrateOptions,
    ) -> MigrationReport {
        let listed = match &options.specific_issues {
            Some(keys) => self.source.list_specific(project_key, keys).await,
            None => self.source.list_all(project_key).await,
        };
        let mut issues = match listed {
            Ok(issues) => issues,
            Err(err) => {
                tracing::error!(project = project_key, error = %format!("{err:#}"), "could not list source issues");
                return MigrationReport::default();
            }
        };
        issues.sort_by(|a, b| a.created.cmp(&b.created));

        let cache = if options.skip_updates {
            match self.existing_items(target_project).await {
                Ok(cache) => Some(cache),
                Err(err) => {
                    // Only a fast path: fall back to per-issue lookups.
                    tracing::warn!(error = %format!("{err:#}"), "could not prefetch work packages, looking up each issue");
                    None
                }
            }
        } else {
            None
        };

        tracing::info!(project = project_key, count = issues.len(), "migrating issues");

        let mut report = MigrationReport::default();
        for issue in &issues {
            let result = self
                .migrate_issue(issue, target_project, options, cache.as_ref(), &mut report.index)
                .await;
            match result {
                Ok(outcome) => {
                    tracing::info!(issue = %issue.key, item = outcome.item_id(), ?outcome, "issue migrated");
                    report.summary.record(outcome);
                }
                Err(err) => {
                    tracing::error!(
                        issue = %issue.key,
                        error = %err,
                        body = ?err.response_body(),
                        "issue migration failed"
                    );
                    report.summary.errors += 1;
                }
            }
        }

        report
    }

    /// Source key -> item for everything already on the target.
    async fn existing_items(&self, project_id: u64) -> Result<HashMap<String, TargetWorkItem>> {
        let items = self
            .target
            .list_all(project_id)
            .await
            .with_context(|| format!("Failed to list work packages of project {project_id}"))?;
        let mut cache = HashMap::new();
        for item in items {
            if let Some(key) = item.source_key.clone() {
                cache.entry(key).or_insert(item);
            }
        }
        tracing::debug!(count = cache.len(), "prefetched existing work packages");
        Ok(cache)
    }

    async fn migrate_issue(
        &self,
        issue: &SourceIssue,
        project_id: u64,
        options: &MigrateOptions,
        cache: Option<&HashMap<String, TargetWorkItem>>,
        index: &mut BTreeMap<String, u64>,
    ) -> Result<IssueOutcome, MigrateError> {
        let existing = match cache {
            Some(cache) => {
                if let Some(item) = cache.get(&issue.key) {
                    index.insert(issue.key.clone(), item.id);
                    return Ok(IssueOutcome::Skipped(item.id));
                }
                None
            }
            None => self.target.find_by_key(&issue.key, project_id).await?,
        };

        let payload = translate(issue, self.lookups, self.identities, options)?;

        let (item, outcome) = match existing {
            Some(existing) => {
                let item = self.target.update(&existing, &payload).await?;
                let id = item.id;
                (item, IssueOutcome::Updated(id))
            }
            None => {
                let remediation = Remediation::new(project_id)
                    .identity("assignee", payload.assignee_id)
                    .identity("responsible", payload.responsible_id);
                let target = self.target;
                let payload = &payload;
                let item = run_with_remediation(target, &remediation, move || {
                    target.create(project_id, payload)
                })
                .await?;
                let id = item.id;
                (item, IssueOutcome::Created(id))
            }
        };
        index.insert(issue.key.clone(), item.id);

        self.sync_attachments(issue, item.id).await?;
        self.sync_comments(issue, item.id).await?;
        self.sync_watchers(issue, item.id, project_id).await?;

        Ok(outcome)
    }

    async fn sync_attachments(&self, issue: &SourceIssue, item_id: u64) -> Result<(), MigrateError> {
        if issue.attachments.is_empty() {
            return Ok(());
        }
        let mut existing = self.target.list_attachments(item_id).await?;

        for attachment in &issue.attachments {
            if attachment_exists(&attachment.filename, &existing) {
                tracing::debug!(issue = %issue.key, file = %attachment.filename, "attachment already present");
                continue;
            }
            // Removed on drop, whether or not the upload succeeds.
            let dir = tempfile::tempdir()?;
            let path = dir.path().join("attachment");
            self.transfer.download(&attachment.content_url, &path).await?;
            self.target
                .upload_attachment(item_id, &path, &attachment.filename)
                .await?;
            existing.push(TargetAttachment {
                file_name: attachment.filename.clone(),
            });
        }
        Ok(())
    }

    async fn sync_comments(&self, issue: &SourceIssue, item_id: u64) -> Result<(), MigrateError> {
        if issue.comments.is_empty() {
            return Ok(());
        }
        let mut existing = self.target.list_comments(item_id).await?;

        for comment in &issue.comments {
            let body = render_or_empty(comment.body.as_ref(), &issue.key);
            if body.is_empty() {
                continue;
            }
            let rendered = render_comment(
                &comment.author.display_name,
                &comment.created,
                &body,
                &self.comment_time_format,
            );
            if comment_exists(&rendered, &existing) {
                continue;
            }
            self.target.add_comment(item_id, &rendered).await?;
            existing.push(TargetComment { raw: rendered });
        }
        Ok(())
    }

    async fn sync_watchers(
        &self,
        issue: &SourceIssue,
        item_id: u64,
        project_id: u64,
    ) -> Result<(), MigrateError> {
        if issue.watch_count == 0 {
            return Ok(());
        }
        let watchers = self.source.watchers(&issue.key).await?;

        for watcher in &watchers {
            let Some(user_id) = self.identities.resolve(&watcher.account_id) else {
                tracing::debug!(issue = %issue.key, watcher = %watcher.display_name, "watcher has no target user");
                continue;
            };
            let remediation = Remediation::new(project_id).identity("user", Some(user_id));
            let target = self.target;
            run_with_remediation(target, &remediation, move || {
                target.add_watcher(item_id, user_id)
            })
            .await?;
        }
        Ok(())
    }
}
