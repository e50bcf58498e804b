//! MCP server initialization for stdio and SSE transports.
//!
//! [`serve_stdio`] and [`serve_sse`] open the cache, probe the similarity
//! index, connect the upstream client, and run the tool handler. Buffered
//! counters are flushed once the transport shuts down.

use std::sync::Arc;

use anyhow::Result;
use rmcp::ServiceExt;

use crate::tools::CacheTools;
use jira_cache::cache::{AdaptiveTtl, CacheStore, FlushPolicy};
use jira_cache::config::CacheConfig;
use jira_cache::db;
use jira_cache::retrieval::Retriever;
use jira_cache::similarity::SimilarityIndex;
use jira_cache::upstream::rest::JiraRestClient;
use jira_cache::upstream::{IssueTracker, Unconfigured, UpstreamError};

/// Open the store, probe embeddings, and build the retriever.
fn setup_retriever(config: &CacheConfig) -> Result<Arc<Retriever>> {
    let db_path = config.resolved_db_path();
    let store = CacheStore::open(
        &db_path,
        FlushPolicy::every(config.cache.counter_flush_threshold),
        AdaptiveTtl::from_config(&config.ttl, &config.cache),
    )?;
    tracing::info!(db = %db_path.display(), "cache store ready");

    let conn = store.connection();
    if let Ok(guard) = conn.lock() {
        if let Ok(Some(stored_model)) = db::migrations::get_embedding_model(&guard) {
            if stored_model != config.embedding.model {
                tracing::warn!(
                    stored = %stored_model,
                    configured = %config.embedding.model,
                    "embedding model changed, run `jira-cache reindex` to update all vectors"
                );
            }
        }
    }

    let similarity = SimilarityIndex::new(conn, &config.embedding);
    tracing::info!(available = similarity.is_available(), "similarity index probed");

    let upstream: Arc<dyn IssueTracker> = match JiraRestClient::new(&config.upstream) {
        Ok(client) => Arc::new(client),
        Err(UpstreamError::NotConfigured(reason)) => {
            tracing::warn!(%reason, "Jira upstream not configured, serving from cache only");
            Arc::new(Unconfigured::new(reason))
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Arc::new(Retriever::new(
        Arc::new(store),
        Arc::new(similarity),
        upstream,
        config.cache.clone(),
        config.upstream.default_fields.clone(),
    )))
}

fn flush_on_shutdown(retriever: &Retriever) {
    match retriever.store().flush_counters() {
        Ok(()) => tracing::info!("counters flushed"),
        Err(e) => tracing::warn!(error = %e, "failed to flush counters on shutdown"),
    }
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: CacheConfig) -> Result<()> {
    tracing::info!("starting jira-cache MCP server on stdio");

    let retriever = setup_retriever(&config)?;
    let tools = CacheTools::new(Arc::clone(&retriever), config.response.max_chars);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    flush_on_shutdown(&retriever);
    Ok(())
}

/// Start the MCP server over Streamable HTTP (SSE) transport.
pub async fn serve_sse(config: CacheConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(addr = %bind_addr, "starting jira-cache MCP server on SSE/HTTP");

    let retriever = setup_retriever(&config)?;
    let max_chars = config.response.max_chars;

    let session_retriever = Arc::clone(&retriever);
    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(CacheTools::new(Arc::clone(&session_retriever), max_chars)),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down SSE server");
        })
        .await?;

    flush_on_shutdown(&retriever);
    Ok(())
}
