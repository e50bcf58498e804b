//! Response-size degradation.
//!
//! Every tool result passes through [`fit_to_budget`] before it is handed to
//! the caller. Stages run in order and each runs only while the payload is
//! still over budget:
//!
//! 1. strip [`NOISE_FIELDS`](crate::cache::noise::NOISE_FIELDS) at every depth
//! 2. paginate the issue array: estimate a prefix length from the average
//!    element size, then halve it until the page fits or one element is left
//! 3. compact every issue to a handful of summary fields (re-paginating if the
//!    compacted list is still too large)
//! 4. flat truncation with [`TRUNCATION_MARKER`], the only stage whose output
//!    is not valid JSON
//!
//! Sizes are measured in UTF-8 bytes, which never undercounts characters.

use serde_json::{json, Map, Value};

use crate::cache::extract::project_issue;
use crate::cache::noise::strip_noise;

pub const TRUNCATION_MARKER: &str = "...truncated";

/// Keys checked, at the root and under `data`, for the issue array.
const ARRAY_KEYS: &[&str] = &["issues", "results", "values"];

/// Serialize `payload` so that the result is at most `max_chars` long.
pub fn fit_to_budget(payload: &Value, max_chars: usize) -> String {
    let text = to_json(payload);
    if text.len() <= max_chars {
        return text;
    }
    let original_size = text.len();

    let stripped = strip_noise(payload);
    let text = to_json(&stripped);
    if text.len() <= max_chars {
        tracing::debug!(original_size, size = text.len(), "response fit after stripping noise");
        return text;
    }

    // A bare array becomes {"issues": [...]} so pagination metadata has a home.
    let doc = match stripped {
        Value::Array(items) => json!({ "issues": items }),
        other => other,
    };
    let Some(pointer) = locate_issue_array(&doc) else {
        tracing::debug!(original_size, "no issue array found, truncating response");
        return truncate(&text, max_chars);
    };

    if let Some(page) = paginate(&doc, &pointer, max_chars) {
        tracing::debug!(original_size, size = page.len(), "response paginated");
        return page;
    }

    let compacted = compact(&doc, &pointer, original_size);
    let text = to_json(&compacted);
    if text.len() <= max_chars {
        tracing::debug!(original_size, size = text.len(), "response compacted");
        return text;
    }
    if let Some(page) = paginate(&compacted, &pointer, max_chars) {
        tracing::debug!(original_size, size = page.len(), "response compacted and paginated");
        return page;
    }

    tracing::warn!(original_size, max_chars, "response truncated");
    truncate(&text, max_chars)
}

/// JSON pointer to the first non-empty issue array in a conventional position.
fn locate_issue_array(doc: &Value) -> Option<String> {
    let candidates = ARRAY_KEYS
        .iter()
        .map(|k| format!("/{k}"))
        .chain(ARRAY_KEYS.iter().map(|k| format!("/data/{k}")));
    for pointer in candidates {
        if doc
            .pointer(&pointer)
            .and_then(Value::as_array)
            .is_some_and(|items| !items.is_empty())
        {
            return Some(pointer);
        }
    }
    None
}

/// Keep a prefix of the array at `pointer` and attach `pagination`.
/// Returns `None` when even a single element does not fit.
fn paginate(doc: &Value, pointer: &str, max_chars: usize) -> Option<String> {
    let mut shell = doc.clone();
    let items = match shell.pointer_mut(pointer) {
        Some(slot) => std::mem::take(slot),
        None => return None,
    };
    let items = items.as_array()?;
    let total = items.len();
    if total == 0 {
        return None;
    }

    // The offset lives beside the array, e.g. `/data/offset` for `/data/issues`.
    let container = doc.pointer(&pointer[..pointer.rfind('/').unwrap_or(0)]);
    let base_offset = ["startAt", "offset"]
        .iter()
        .find_map(|k| container.and_then(|c| c.get(*k)).and_then(Value::as_u64))
        .unwrap_or(0) as usize;

    let element_chars: usize = items.iter().map(|item| to_json(item).len() + 1).sum();
    let average = (element_chars / total).max(1);
    let overhead = to_json(&page(&shell, pointer, &items[..0], total, base_offset)).len();

    let mut keep = (max_chars.saturating_sub(overhead) / average).clamp(1, total);
    loop {
        let candidate = to_json(&page(&shell, pointer, &items[..keep], total, base_offset));
        if candidate.len() <= max_chars {
            return Some(candidate);
        }
        if keep == 1 {
            return None;
        }
        keep = (keep / 2).max(1);
    }
}

fn page(shell: &Value, pointer: &str, kept: &[Value], total: usize, base_offset: usize) -> Value {
    let mut out = shell.clone();
    if let Some(slot) = out.pointer_mut(pointer) {
        *slot = Value::Array(kept.to_vec());
    }
    let returned = kept.len();
    let has_more = returned < total;
    if let Some(root) = out.as_object_mut() {
        root.insert(
            "pagination".to_string(),
            json!({
                "total": total,
                "returned": returned,
                "has_more": has_more,
                "next_offset": has_more.then_some(base_offset + returned),
            }),
        );
    }
    out
}

/// Replace every element of the issue array with its summary fields.
fn compact(doc: &Value, pointer: &str, original_size: usize) -> Value {
    let mut out = doc.clone();
    if let Some(Value::Array(items)) = out.pointer_mut(pointer) {
        for item in items.iter_mut() {
            *item = compact_issue(item);
        }
    }
    if let Some(root) = out.as_object_mut() {
        root.insert("compacted".to_string(), Value::Bool(true));
        root.insert("original_size".to_string(), json!(original_size));
    }
    out
}

/// Minimal summary of one issue, from a raw Jira record (`fields.*`) or a
/// flat cached record.
pub fn compact_issue(item: &Value) -> Value {
    // Batched reads wrap each issue with its per-key outcome.
    if let Some(inner) = item.get("issue").filter(|v| v.is_object()) {
        let mut out = compact_issue(inner);
        if let Some(map) = out.as_object_mut() {
            for field in ["source", "warning"] {
                if let Some(v) = item.get(field) {
                    map.insert(field.into(), v.clone());
                }
            }
        }
        return out;
    }

    let mut out = Map::new();

    if item.get("fields").is_some() {
        if let Some(p) = project_issue(item) {
            out.insert("key".into(), json!(p.key));
            out.insert("summary".into(), json!(p.summary));
            out.insert("status".into(), json!(p.status));
            out.insert("assignee".into(), json!(p.assignee));
            out.insert("type".into(), json!(p.issue_type));
            if !p.priority.is_empty() {
                out.insert("priority".into(), json!(p.priority));
            }
            if let Some(parent) = p.parent_key {
                out.insert("parent".into(), json!(parent));
            }
            if let Some(sprint) = p.sprint_id {
                out.insert("sprint".into(), json!(sprint));
            }
            if let Some(due) = p.due_date {
                out.insert("due".into(), json!(due));
            }
            return Value::Object(out);
        }
    }

    for (from, to) in [
        ("key", "key"),
        ("summary", "summary"),
        ("status", "status"),
        ("assignee", "assignee"),
        ("issue_type", "type"),
    ] {
        out.insert(to.into(), item.get(from).cloned().unwrap_or(Value::Null));
    }
    for (from, to) in [
        ("priority", "priority"),
        ("parent_key", "parent"),
        ("sprint_id", "sprint"),
        ("due_date", "due"),
        ("error", "error"),
    ] {
        match item.get(from) {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) if s.is_empty() => {}
            Some(v) => {
                out.insert(to.into(), v.clone());
            }
        }
    }
    Value::Object(out)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text.to_string();
    }
    if max_chars <= TRUNCATION_MARKER.len() {
        return TRUNCATION_MARKER[..max_chars].to_string();
    }
    let mut cut = max_chars - TRUNCATION_MARKER.len();
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{TRUNCATION_MARKER}", &text[..cut])
}

fn to_json(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}
