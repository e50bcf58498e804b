use jira_cache::db;
use jira_cache::db::migrations::{get_schema_version, run_migrations, CURRENT_SCHEMA_VERSION};
use rusqlite::Connection;
use tempfile::TempDir;

fn columns(conn: &Connection, table: &str) -> Vec<String> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})")).unwrap();
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    names
}

#[test]
fn fresh_store_is_at_current_version() {
    let conn = db::open_in_memory().unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
}

#[test]
fn v1_file_is_upgraded_in_place_on_open() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.db");
    {
        db::load_sqlite_vec();
        let conn = Connection::open(&path).unwrap();
        db::schema::init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO issues (key, summary, status, assignee, issue_type, sprint_id, description_text, raw, cached_at) \
             VALUES ('PROJ-1', 'Old row', 'Open', NULL, 'Task', NULL, '', '{}', '2026-01-01T00:00:00.000000Z')",
            [],
        )
        .unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
        assert!(!columns(&conn, "issues").contains(&"parent_key".to_string()));
    }

    let conn = db::open_database(&path).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    let cols = columns(&conn, "issues");
    for c in ["parent_key", "priority", "labels", "start_date", "due_date"] {
        assert!(cols.contains(&c.to_string()), "missing column {c}");
    }
    let labels: String = conn
        .query_row("SELECT labels FROM issues WHERE key = 'PROJ-1'", [], |row| row.get(0))
        .unwrap();
    assert_eq!(labels, "[]");
}

#[test]
fn missing_version_marker_means_oldest_schema() {
    db::load_sqlite_vec();
    let mut conn = Connection::open_in_memory().unwrap();
    db::schema::init_schema(&conn).unwrap();
    conn.execute("DELETE FROM schema_meta WHERE key = 'schema_version'", [])
        .unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), 1);

    run_migrations(&mut conn).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
}

#[test]
fn migrations_are_idempotent() {
    let mut conn = db::open_in_memory().unwrap();
    run_migrations(&mut conn).unwrap();
    run_migrations(&mut conn).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
}
