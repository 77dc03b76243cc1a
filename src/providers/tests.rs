use serde_json::json;

use super::jira::{build_jql, SearchResponse};
use super::openproject::{parse_work_item, payload_body};
use super::ApiError;
use crate::model::work_item::WorkItemPayload;

fn search_page() -> serde_json::Value {
    json!({
        "issues": [{
            "key": "PROJ-7",
            "fields": {
                "summary": "Render spec",
                "description": {"type": "doc", "content": []},
                "issuetype": {"name": "Bug"},
                "status": {"name": "In Progress"},
                "priority": {"name": "High"},
                "creator": {"accountId": "acc-1", "displayName": "Ada"},
                "assignee": null,
                "attachment": [
                    {"filename": "spec.pdf", "content": "https://x.atlassian.net/att/1"}
                ],
                "comment": {
                    "comments": [{
                        "author": {"accountId": "acc-2", "displayName": "Grace"},
                        "body": {"type": "doc", "content": []},
                        "created": "2023-01-05T10:00:00.000+0100"
                    }]
                },
                "watches": {"watchCount": 2, "isWatching": false},
                "created": "2023-01-04T08:15:30.123+0000"
            }
        }],
        "isLast": true
    })
}

#[test]
fn jira_issue_maps_to_source_issue() {
    let page: SearchResponse = serde_json::from_value(search_page()).unwrap();
    let issue = page.issues.into_iter().next().unwrap().into_source();

    assert_eq!(issue.key, "PROJ-7");
    assert_eq!(issue.issue_type, "Bug");
    assert_eq!(issue.priority.as_deref(), Some("High"));
    assert_eq!(issue.creator.unwrap().account_id, "acc-1");
    assert!(issue.assignee.is_none());
    assert_eq!(issue.attachments[0].filename, "spec.pdf");
    assert_eq!(issue.comments[0].author.display_name, "Grace");
    assert_eq!(issue.comments[0].created.to_rfc3339(), "2023-01-05T10:00:00+01:00");
    assert_eq!(issue.watch_count, 2);
}

#[test]
fn jira_issue_without_optional_fields() {
    let page: SearchResponse = serde_json::from_value(json!({
        "issues": [{
            "key": "PROJ-1",
            "fields": {
                "summary": "Bare",
                "issuetype": {"name": "Task"},
                "status": {"name": "To Do"},
                "created": "2023-01-01T00:00:00.000+0000"
            }
        }]
    }))
    .unwrap();
    let issue = page.issues.into_iter().next().unwrap().into_source();

    assert!(issue.description.is_none());
    assert!(issue.comments.is_empty());
    assert_eq!(issue.watch_count, 0);
}

#[test]
fn pagination_follows_token_unless_marked_last() {
    let page = |body: serde_json::Value| -> SearchResponse { serde_json::from_value(body).unwrap() };

    let no_flag = page(json!({"issues": [], "nextPageToken": "abc"}));
    assert_eq!(no_flag.next_page(), Some("abc"));

    let not_last = page(json!({"issues": [], "nextPageToken": "abc", "isLast": false}));
    assert_eq!(not_last.next_page(), Some("abc"));

    let last = page(json!({"issues": [], "nextPageToken": "abc", "isLast": true}));
    assert_eq!(last.next_page(), None);

    let no_token = page(json!({"issues": []}));
    assert_eq!(no_token.next_page(), None);
}

#[test]
fn jql_orders_oldest_first() {
    assert_eq!(build_jql("PROJ", None), "project = \"PROJ\" ORDER BY created ASC");
    let keys = vec!["PROJ-1".to_string(), "PROJ-7".to_string()];
    assert_eq!(
        build_jql("PROJ", Some(&keys)),
        "project = \"PROJ\" AND key in (PROJ-1, PROJ-7) ORDER BY created ASC"
    );
}

fn payload() -> WorkItemPayload {
    WorkItemPayload {
        subject: "Render spec".into(),
        description: "Steps".into(),
        type_id: 1,
        status_id: 7,
        priority_id: None,
        assignee_id: Some(5),
        responsible_id: None,
        source_key: "PROJ-7".into(),
    }
}

#[test]
fn payload_body_links_references_and_key_field() {
    let body = payload_body(&payload(), "customField3", None);

    assert_eq!(body["subject"], "Render spec");
    assert_eq!(body["description"]["raw"], "Steps");
    assert_eq!(body["customField3"], "PROJ-7");
    assert_eq!(body["_links"]["type"]["href"], "/api/v3/types/1");
    assert_eq!(body["_links"]["assignee"]["href"], "/api/v3/users/5");
    assert!(body["_links"].get("priority").is_none());
    assert!(body["_links"].get("responsible").is_none());
    assert!(body.get("lockVersion").is_none());
}

#[test]
fn update_body_carries_lock_version() {
    let body = payload_body(&payload(), "customField1", Some(4));
    assert_eq!(body["lockVersion"], 4);
}

#[test]
fn parse_work_package_reads_key_field() {
    let element = json!({
        "_type": "WorkPackage",
        "id": 12,
        "lockVersion": 3,
        "subject": "Render spec",
        "customField1": "PROJ-7"
    });
    let item = parse_work_item(&element, "customField1").unwrap();
    assert_eq!((item.id, item.lock_version), (12, 3));
    assert_eq!(item.source_key.as_deref(), Some("PROJ-7"));

    assert!(parse_work_item(&json!({"subject": "no id"}), "customField1").is_none());
}

#[test]
fn api_error_exposes_rejected_body() {
    let err = ApiError::Rejected {
        status: 422,
        body: json!({"_type": "Error"}),
    };
    assert_eq!(err.body(), Some(&json!({"_type": "Error"})));
    assert!(err.to_string().contains("422"));
    assert!(ApiError::Unexpected(json!(null)).body().is_none());
}
