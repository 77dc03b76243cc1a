use chrono::{DateTime, FixedOffset};

use crate::model::work_item::{TargetAttachment, TargetComment, TargetWorkItem};

pub fn find_work_item<'a>(key: &str, items: &'a [TargetWorkItem]) -> Option<&'a TargetWorkItem> {
    items
        .iter()
        .find(|item| item.source_key.as_deref() == Some(key))
}

pub fn attachment_exists(file_name: &str, attachments: &[TargetAttachment]) -> bool {
    attachments.iter().any(|a| a.file_name == file_name)
}

pub fn comment_exists(rendered: &str, comments: &[TargetComment]) -> bool {
    comments.iter().any(|c| c.raw == rendered)
}

/// The exact text posted for a migrated comment.
///
/// Existing comments are matched against this byte for byte, so the format
/// must not change between runs.
pub fn render_comment(
    author: &str,
    created: &DateTime<FixedOffset>,
    body: &str,
    time_format: &str,
) -> String {
    format!("**{author}** ({}):\n\n{body}", created.format(time_format))
}
