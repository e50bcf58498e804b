//! CLI `reindex` command: regenerate every embedding with the configured model.

use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use jira_cache::config::CacheConfig;
use jira_cache::db;
use jira_cache::embedding;
use jira_cache::similarity::SimilarityIndex;

const BATCH_SIZE: usize = 32;

pub async fn reindex(config: &CacheConfig) -> Result<()> {
    let store = super::open_store(config)?;

    let provider: Arc<dyn embedding::EmbeddingProvider> = Arc::from(
        embedding::create_provider(&config.embedding)
            .context("failed to create embedding provider")?,
    );
    let similarity = Arc::new(SimilarityIndex::with_provider(store.connection(), provider));
    anyhow::ensure!(
        similarity.is_available(),
        "vector table could not be created (sqlite-vec unavailable)"
    );

    let issues = store.indexable_issues()?;
    let total = issues.len();
    if total == 0 {
        println!("No cached issues to index.");
        return Ok(());
    }

    println!("Embedding {total} issues with model '{}'...", config.embedding.model);

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} ({eta})")?
            .progress_chars("##-"),
    );

    let mut stored = 0;
    for chunk in issues.chunks(BATCH_SIZE) {
        let chunk = chunk.to_vec();
        let similarity = Arc::clone(&similarity);
        let n = tokio::task::spawn_blocking(move || similarity.upsert_issues(&chunk))
            .await?
            .context("embedding batch failed")?;
        stored += n;
        pb.inc(n as u64);
    }
    pb.finish_and_clear();

    let pruned = similarity.prune_orphans()?;

    {
        let conn = store.connection();
        let guard = conn
            .lock()
            .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
        db::migrations::set_embedding_model(&guard, &config.embedding.model)?;
    }

    println!(
        "Indexed {stored} issues with model '{}' ({pruned} orphaned vectors removed).",
        config.embedding.model
    );
    Ok(())
}
