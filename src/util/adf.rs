use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("document is not an object or string")]
    NotADocument,
    #[error("document has no block content")]
    MissingContent,
}

/// Render Jira's Atlassian Document Format (ADF) as plain text.
///
/// Each top-level block contributes its inline text runs concatenated, and
/// blocks are joined by a single newline. The result is trimmed.
pub fn render_plain_text(value: &Value) -> Result<String, RenderError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Object(obj) => {
            let blocks = obj
                .get("content")
                .and_then(|v| v.as_array())
                .ok_or(RenderError::MissingContent)?;
            let lines: Vec<String> = blocks
                .iter()
                .map(|block| {
                    let mut line = String::new();
                    collect_inline_text(block, &mut line);
                    line
                })
                .collect();
            Ok(lines.join("\n").trim().to_string())
        }
        _ => Err(RenderError::NotADocument),
    }
}

/// Like [`render_plain_text`], but a failure degrades to an empty string.
pub fn render_or_empty(value: Option<&Value>, context: &str) -> String {
    let Some(value) = value else {
        return String::new();
    };
    match render_plain_text(value) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(context, error = %e, "could not render rich text, using empty text");
            String::new()
        }
    }
}

fn collect_inline_text(node: &Value, out: &mut String) {
    let Some(obj) = node.as_object() else {
        return;
    };
    match obj.get("type").and_then(|v| v.as_str()) {
        Some("text") => {
            if let Some(text) = obj.get("text").and_then(|v| v.as_str()) {
                out.push_str(text);
            }
        }
        Some("hardBreak") => out.push('\n'),
        Some("mention") | Some("emoji") => {
            if let Some(text) = obj
                .get("attrs")
                .and_then(|a| a.get("text"))
                .and_then(|v| v.as_str())
            {
                out.push_str(text);
            }
        }
        _ => {
            if let Some(children) = obj.get("content").and_then(|v| v.as_array()) {
                for child in children {
                    collect_inline_text(child, out);
                }
            }
        }
    }
}
