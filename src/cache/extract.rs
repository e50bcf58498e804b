//! Derived-field projection out of raw upstream records.
//!
//! The store never trusts callers to pre-compute indexable fields; everything
//! it persists beside `raw` is read out of `raw` here.

use serde_json::Value;

/// Jira Cloud's default custom field for sprint membership.
const SPRINT_FIELD: &str = "customfield_10020";
/// Jira Cloud's default custom field for the start date.
const START_DATE_FIELD: &str = "customfield_10015";

/// Columns projected from an issue record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueProjection {
    pub key: String,
    pub summary: String,
    pub status: String,
    pub assignee: Option<String>,
    pub issue_type: String,
    pub sprint_id: Option<i64>,
    pub parent_key: Option<String>,
    pub priority: String,
    pub labels: Vec<String>,
    pub start_date: Option<String>,
    pub due_date: Option<String>,
    pub description_text: String,
}

/// Columns projected from a sprint record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SprintProjection {
    pub id: i64,
    pub name: String,
    pub state: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub goal: Option<String>,
}

/// Project an issue record. Returns `None` for records without a usable key.
pub fn project_issue(raw: &Value) -> Option<IssueProjection> {
    let key = raw.get("key").and_then(Value::as_str)?.trim();
    if key.is_empty() {
        return None;
    }

    let empty = Value::Null;
    let fields = raw.get("fields").unwrap_or(&empty);

    Some(IssueProjection {
        key: key.to_string(),
        summary: str_at(fields, &["summary"]).unwrap_or_default(),
        status: named(fields.get("status")).unwrap_or_default(),
        assignee: fields
            .get("assignee")
            .and_then(|a| str_at(a, &["displayName"]).or_else(|| a.as_str().map(String::from))),
        issue_type: named(fields.get("issuetype")).unwrap_or_default(),
        sprint_id: sprint_id(fields),
        parent_key: str_at(fields, &["parent", "key"]),
        priority: named(fields.get("priority")).unwrap_or_default(),
        labels: fields
            .get("labels")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default(),
        start_date: str_at(fields, &[START_DATE_FIELD]).or_else(|| str_at(fields, &["startDate"])),
        due_date: str_at(fields, &["duedate"]),
        description_text: fields
            .get("description")
            .map(rich_text_to_plain)
            .unwrap_or_default(),
    })
}

/// Project a sprint record. Returns `None` if it has no integer id.
pub fn project_sprint(raw: &Value) -> Option<SprintProjection> {
    let id = raw.get("id").and_then(Value::as_i64)?;
    Some(SprintProjection {
        id,
        name: str_at(raw, &["name"]).unwrap_or_default(),
        state: str_at(raw, &["state"]).unwrap_or_default(),
        start_date: str_at(raw, &["startDate"]),
        end_date: str_at(raw, &["endDate"]),
        goal: str_at(raw, &["goal"]).filter(|g| !g.is_empty()),
    })
}

/// Flatten an Atlassian Document Format tree (or a plain string) to text.
pub fn rich_text_to_plain(value: &Value) -> String {
    let mut out = String::new();
    collect_text(value, &mut out);
    out.trim().to_string()
}

fn collect_text(node: &Value, out: &mut String) {
    match node {
        Value::String(s) => out.push_str(s),
        Value::Array(items) => items.iter().for_each(|n| collect_text(n, out)),
        Value::Object(map) => {
            let node_type = map.get("type").and_then(Value::as_str).unwrap_or("");
            match node_type {
                "hardBreak" => out.push('\n'),
                "mention" | "emoji" | "status" => {
                    if let Some(text) = map
                        .get("attrs")
                        .and_then(|a| a.get("text"))
                        .and_then(Value::as_str)
                    {
                        out.push_str(text);
                    }
                }
                _ => {
                    if let Some(text) = map.get("text").and_then(Value::as_str) {
                        out.push_str(text);
                    }
                    if let Some(content) = map.get("content") {
                        collect_text(content, out);
                    }
                    if is_block(node_type) && !out.ends_with('\n') {
                        out.push('\n');
                    }
                }
            }
        }
        _ => {}
    }
}

fn is_block(node_type: &str) -> bool {
    matches!(
        node_type,
        "paragraph" | "heading" | "listItem" | "codeBlock" | "blockquote" | "rule" | "tableRow"
    )
}

/// Sprint membership: an explicit `sprint` object, else the custom sprint field,
/// preferring the active sprint and falling back to the most recent one.
fn sprint_id(fields: &Value) -> Option<i64> {
    if let Some(id) = fields.get("sprint").and_then(|s| s.get("id")).and_then(Value::as_i64) {
        return Some(id);
    }
    let sprints = fields.get(SPRINT_FIELD)?.as_array()?;
    sprints
        .iter()
        .find(|s| s.get("state").and_then(Value::as_str) == Some("active"))
        .or_else(|| sprints.last())
        .and_then(|s| s.get("id"))
        .and_then(Value::as_i64)
}

/// `{"name": ..}` objects (status, issuetype, priority) or bare strings.
fn named(value: Option<&Value>) -> Option<String> {
    let value = value?;
    value
        .get("name")
        .and_then(Value::as_str)
        .or_else(|| value.as_str())
        .map(String::from)
}

fn str_at(value: &Value, path: &[&str]) -> Option<String> {
    path.iter()
        .try_fold(value, |v, segment| v.get(segment))
        .and_then(Value::as_str)
        .map(String::from)
}
