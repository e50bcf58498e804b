//! CLI `purge` command.

use anyhow::Result;

use jira_cache::cache::store::{ISSUE_PURGE_AGE_DAYS, SEARCH_PURGE_AGE_HOURS};
use jira_cache::config::CacheConfig;
use jira_cache::similarity::SimilarityIndex;

/// Remove aged-out issues and searches, then prune orphaned embeddings.
///
/// Embeddings are pruned only when the model is installed; otherwise the
/// vector table is left for the next `reindex`.
pub fn purge(config: &CacheConfig) -> Result<()> {
    let store = super::open_store(config)?;
    let result = store.purge_stale()?;

    println!(
        "Removed {} issues older than {ISSUE_PURGE_AGE_DAYS} days and {} searches older than {SEARCH_PURGE_AGE_HOURS} hours.",
        result.issues_removed, result.searches_removed
    );

    let similarity = SimilarityIndex::new(store.connection(), &config.embedding);
    if similarity.is_available() {
        let pruned = similarity.prune_orphans()?;
        println!("Pruned {pruned} orphaned embeddings.");
    }

    Ok(())
}
