//! Cache keys for search result sets.
//!
//! Functionally identical searches must collide on one entry: the query is
//! lower-cased and whitespace-collapsed, and the field list is normalized and
//! sorted, before hashing.

use sha2::{Digest, Sha256};

/// Lower-case the query and collapse every whitespace run to one space.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Trimmed, lower-cased, sorted, de-duplicated field names.
pub fn normalize_fields(fields: &[String]) -> Vec<String> {
    let mut out: Vec<String> = fields
        .iter()
        .map(|f| f.trim().to_lowercase())
        .filter(|f| !f.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

/// SHA-256 hex digest over the normalized (query, fields, limit, offset) tuple.
pub fn search_key(query: &str, fields: &[String], limit: usize, offset: usize) -> String {
    let input = format!(
        "search:{}|fields:{}|limit:{}|offset:{}",
        normalize_query(query),
        normalize_fields(fields).join(","),
        limit,
        offset
    );
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn case_and_whitespace_do_not_matter() {
        let a = search_key("project = PROJ AND status = Done", &fields(&["summary"]), 50, 0);
        let b = search_key("  project   =  proj and\tstatus = done ", &fields(&["summary"]), 50, 0);
        assert_eq!(a, b);
    }

    #[test]
    fn field_order_does_not_matter() {
        let a = search_key("q", &fields(&["summary", "status"]), 10, 0);
        let b = search_key("q", &fields(&["status", "Summary", "status"]), 10, 0);
        assert_eq!(a, b);
    }

    #[test]
    fn limit_changes_the_key() {
        let a = search_key("q", &fields(&["summary"]), 10, 0);
        let b = search_key("q", &fields(&["summary"]), 20, 0);
        assert_ne!(a, b);
    }

    #[test]
    fn offset_changes_the_key() {
        assert_ne!(search_key("q", &[], 10, 0), search_key("q", &[], 10, 10));
    }

    #[test]
    fn key_is_hex_sha256() {
        let key = search_key("q", &[], 1, 0);
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
