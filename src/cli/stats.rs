use anyhow::Result;

use super::format_bytes;
use jira_cache::config::CacheConfig;

/// Print cache statistics.
pub fn stats(config: &CacheConfig) -> Result<()> {
    let store = super::open_store(config)?;
    let response = store.stats()?;

    println!("Cache Statistics");
    println!("{}", "=".repeat(40));
    println!("  Issues:              {}", response.issues);
    println!("  Sprints:             {}", response.sprints);
    println!("  Searches:            {}", response.searches);
    println!();
    println!("Lookups:");
    println!("  Hits:                {}", response.hits);
    println!("  Misses:              {}", response.misses);
    println!("  Hit rate:            {:.1}%", response.hit_rate * 100.0);
    println!("  Stale served:        {}", response.stale_served);
    println!("  Upstream errors:     {}", response.upstream_errors);
    println!();
    println!("Purged issues:         {}", response.purged_issues);
    println!("Purged searches:       {}", response.purged_searches);
    println!("Store size:            {}", format_bytes(response.db_size_bytes));
    println!("Schema version:        {}", response.schema_version);

    if let Some(ref oldest) = response.oldest_issue {
        println!("Oldest issue:          {oldest}");
    }
    if let Some(ref newest) = response.newest_issue {
        println!("Newest issue:          {newest}");
    }

    Ok(())
}
