//! Upstream noise removal.
//!
//! Jira records carry REST self-links, avatar URL maps, icon links, and a
//! `statusCategory` object that duplicates `status`. None of it helps an agent,
//! and all of it costs response budget, so it is stripped before persisting
//! and again before responding.

use serde_json::Value;

/// Field names removed at any depth.
pub const NOISE_FIELDS: &[&str] = &[
    "self",
    "avatarUrls",
    "iconUrl",
    "expand",
    "statusCategory",
    "avatarId",
    "accountType",
    "timeZone",
    "entityId",
    "hierarchyLevel",
    "_links",
    "watches",
    "votes",
    "renderedFields",
];

/// Return a copy of `value` with every [`NOISE_FIELDS`] key removed recursively.
pub fn strip_noise(value: &Value) -> Value {
    let mut out = value.clone();
    strip_noise_in_place(&mut out);
    out
}

/// In-place variant of [`strip_noise`].
pub fn strip_noise_in_place(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|k, _| !NOISE_FIELDS.contains(&k.as_str()));
            for child in map.values_mut() {
                strip_noise_in_place(child);
            }
        }
        Value::Array(items) => {
            for child in items {
                strip_noise_in_place(child);
            }
        }
        _ => {}
    }
}
