//! CLI `doctor` command: run store diagnostics and print a health report.

use anyhow::{Context, Result};

use super::format_bytes;
use jira_cache::config::{expand_tilde, CacheConfig};
use jira_cache::db;

pub fn doctor(config: &CacheConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Cache: not found at {}", db_path.display());
        println!("Run `jira-cache serve` to initialize.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let conn = db::open_database(&db_path).context("failed to open cache (may be corrupt)")?;
    let report = db::check_database_health(&conn).context("failed to run health check")?;

    let model_dir = expand_tilde(&config.embedding.cache_dir);
    let model_installed =
        model_dir.join("model.onnx").exists() && model_dir.join("tokenizer.json").exists();

    println!("jira-cache Health Report");
    println!("========================");
    println!();
    println!("Cache file:        {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!(
        "sqlite-vec:        {}",
        report.sqlite_vec_version.as_deref().unwrap_or("(unavailable)")
    );
    println!();
    println!("Embedding model:");
    println!("  Installed:       {}", if model_installed { "yes" } else { "no (run `jira-cache model download`)" });
    println!("  Indexed with:    {}", report.embedding_model.as_deref().unwrap_or("(not set)"));
    println!("  Configured:      {}", config.embedding.model);
    if let Some(ref stored) = report.embedding_model {
        if stored != &config.embedding.model {
            println!("  WARNING: model mismatch! Run `jira-cache reindex` to update vectors.");
        }
    }
    println!();
    println!("Row counts:");
    println!("  Issues:          {}", report.issue_count);
    println!("  Sprints:         {}", report.sprint_count);
    println!("  Searches:        {}", report.search_count);
    println!();
    println!("Upstream:          {}", if config.upstream.base_url.is_empty() { "(not configured)" } else { &config.upstream.base_url });
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("The cache holds no original data. Delete the file and restart to rebuild it.");
    }

    Ok(())
}
