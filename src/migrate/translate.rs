use crate::lookup::{Lookups, UnknownLookupKey};
use crate::model::identity::IdentityMap;
use crate::model::issue::SourceIssue;
use crate::model::work_item::WorkItemPayload;
use crate::util::adf::render_or_empty;

use super::MigrateOptions;

/// Build the target payload for one source issue.
pub fn translate(
    issue: &SourceIssue,
    lookups: &dyn Lookups,
    identities: &IdentityMap,
    options: &MigrateOptions,
) -> Result<WorkItemPayload, UnknownLookupKey> {
    let priority_id = issue
        .priority
        .as_deref()
        .map(|p| lookups.priority_id(p))
        .transpose()?;

    let responsible_id = if options.map_responsible {
        issue
            .creator
            .as_ref()
            .and_then(|c| identities.resolve(&c.account_id))
    } else {
        None
    };

    Ok(WorkItemPayload {
        subject: issue.summary.clone(),
        description: render_or_empty(issue.description.as_ref(), &issue.key),
        type_id: lookups.type_id(&issue.issue_type)?,
        status_id: lookups.status_id(&issue.status)?,
        priority_id,
        assignee_id: issue
            .assignee
            .as_ref()
            .and_then(|a| identities.resolve(&a.account_id)),
        responsible_id,
        source_key: issue.key.clone(),
    })
}
