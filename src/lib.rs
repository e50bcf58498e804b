//! Caching and retrieval layer between an agent's tool runtime and Jira.
//!
//! jira-cache is an [MCP](https://modelcontextprotocol.io/) server that serves
//! issues, sprints and JQL searches from a local store, keeps two local search
//! modes over what it has cached, and guarantees that no single response
//! exceeds a fixed size budget.
//!
//! | Record | Key | Default freshness |
//! |--------|-----|-------------------|
//! | **Issue** | `PROJ-123` | by status: 24 h terminal, 5 min active, 30 min otherwise |
//! | **Sprint** | sprint id | 1 h |
//! | **Search** | hash of normalized query, fields, limit, offset | 15 min |
//!
//! # Architecture
//!
//! - **Storage**: SQLite with FTS5 for keyword search and
//!   [sqlite-vec](https://github.com/asg017/sqlite-vec) for similarity search
//! - **Embeddings**: Local ONNX Runtime with all-MiniLM-L6-v2 (384 dimensions), optional
//! - **Reads**: cache-aside with a stale fallback when Jira is unreachable
//! - **Responses**: strip, paginate, compact, and as a last resort truncate
//! - **Transport**: MCP over stdio (primary) or Streamable HTTP/SSE
//!
//! # Modules
//!
//! - [`config`]: configuration from TOML files and environment variables
//! - [`db`]: SQLite initialization, schema, migrations, and health checks
//! - [`cache`]: the record store, keyword index, TTL policy, and counters
//! - [`embedding`]: text-to-vector embedding via ONNX Runtime
//! - [`similarity`]: the optional vector index over cached issues
//! - [`degrade`]: response-size degradation
//! - [`upstream`]: the issue-tracker seam and its Jira REST client
//! - [`retrieval`]: cache-aside orchestration

pub mod cache;
pub mod config;
pub mod db;
pub mod degrade;
pub mod embedding;
pub mod retrieval;
pub mod similarity;
pub mod upstream;
