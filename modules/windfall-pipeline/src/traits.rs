// Trait abstractions for pipeline dependencies.
//
// ContentFetcher — scraping, web search, news and encyclopedia lookup.
// PipelineStore — all document reads/writes behind one trait.
// VectorIndex — embedding upsert and nearest-neighbor query.
// Notifier — final notification dispatch for newly committed items.
//
// These enable deterministic testing with the mocks in `testing.rs`:
// no network, no database. `cargo test` in seconds.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use windfall_common::config::RunSettings;
use windfall_common::types::{Article, Event, Opportunity, RunAudit, Source, WatchlistEntity};
use windfall_store::{DocStore, PgVectorIndex, VectorHit};

// ---------------------------------------------------------------------------
// ContentFetcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    /// Rendered text/markdown. Empty means the fetch produced nothing usable.
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetch and render a web page to text.
    async fn page(&self, url: &str) -> Result<FetchedPage>;

    /// General web search.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>>;

    /// Recent-news search.
    async fn news(&self, query: &str) -> Result<Vec<SearchResult>>;

    /// Encyclopedia summary for a named entity, if one exists.
    async fn encyclopedia(&self, topic: &str) -> Result<Option<String>>;
}

// ---------------------------------------------------------------------------
// PipelineStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PipelineStore: Send + Sync {
    // --- Articles ---
    async fn scraped_articles(
        &self,
        country: Option<&str>,
        sources: Option<&[String]>,
    ) -> Result<Vec<Article>>;
    async fn processed_article_links(&self, links: &[String]) -> Result<HashSet<String>>;
    async fn article_by_link(&self, link: &str) -> Result<Option<Article>>;
    async fn upsert_article(&self, article: &Article) -> Result<()>;

    // --- Events ---
    async fn existing_event_keys(&self, keys: &[String]) -> Result<HashSet<String>>;
    async fn upsert_event(&self, event: &Event) -> Result<()>;

    // --- Opportunities ---
    async fn opportunity_by_name(&self, name: &str) -> Result<Option<Opportunity>>;
    async fn upsert_opportunity(&self, opportunity: &Opportunity) -> Result<()>;

    // --- Watchlist ---
    async fn watchlist_entities(&self) -> Result<Vec<WatchlistEntity>>;
    async fn upsert_watchlist_entity(&self, entity: &WatchlistEntity) -> Result<()>;
    async fn add_watchlist_alias(&self, entity_name: &str, alias: &str) -> Result<()>;

    // --- Sources ---
    async fn sources_by_names(&self, names: &[String]) -> Result<HashMap<String, Source>>;
    async fn upsert_source(&self, source: &Source) -> Result<()>;

    // --- Settings & audit ---
    async fn run_settings(&self) -> Result<RunSettings>;
    async fn insert_run_audit(&self, audit: &RunAudit) -> Result<()>;
}

#[async_trait]
impl PipelineStore for DocStore {
    async fn scraped_articles(
        &self,
        country: Option<&str>,
        sources: Option<&[String]>,
    ) -> Result<Vec<Article>> {
        DocStore::scraped_articles(self, country, sources).await
    }

    async fn processed_article_links(&self, links: &[String]) -> Result<HashSet<String>> {
        DocStore::processed_article_links(self, links).await
    }

    async fn article_by_link(&self, link: &str) -> Result<Option<Article>> {
        DocStore::article_by_link(self, link).await
    }

    async fn upsert_article(&self, article: &Article) -> Result<()> {
        DocStore::upsert_article(self, article).await
    }

    async fn existing_event_keys(&self, keys: &[String]) -> Result<HashSet<String>> {
        DocStore::existing_event_keys(self, keys).await
    }

    async fn upsert_event(&self, event: &Event) -> Result<()> {
        DocStore::upsert_event(self, event).await
    }

    async fn opportunity_by_name(&self, name: &str) -> Result<Option<Opportunity>> {
        DocStore::opportunity_by_name(self, name).await
    }

    async fn upsert_opportunity(&self, opportunity: &Opportunity) -> Result<()> {
        DocStore::upsert_opportunity(self, opportunity).await
    }

    async fn watchlist_entities(&self) -> Result<Vec<WatchlistEntity>> {
        DocStore::watchlist_entities(self).await
    }

    async fn upsert_watchlist_entity(&self, entity: &WatchlistEntity) -> Result<()> {
        DocStore::upsert_watchlist_entity(self, entity).await
    }

    async fn add_watchlist_alias(&self, entity_name: &str, alias: &str) -> Result<()> {
        DocStore::add_watchlist_alias(self, entity_name, alias).await
    }

    async fn sources_by_names(&self, names: &[String]) -> Result<HashMap<String, Source>> {
        DocStore::sources_by_names(self, names).await
    }

    async fn upsert_source(&self, source: &Source) -> Result<()> {
        DocStore::upsert_source(self, source).await
    }

    async fn run_settings(&self) -> Result<RunSettings> {
        DocStore::run_settings(self).await
    }

    async fn insert_run_audit(&self, audit: &RunAudit) -> Result<()> {
        DocStore::insert_run_audit(self, audit).await
    }
}

// ---------------------------------------------------------------------------
// VectorIndex
// ---------------------------------------------------------------------------

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Upsert a vector under a `{type}_{id}` identifier with retrieval metadata.
    async fn upsert(&self, id: &str, kind: &str, vector: &[f32], metadata: &Value) -> Result<()>;

    /// Nearest neighbors by cosine similarity, optionally filtered by kind.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        kind: Option<&str>,
    ) -> Result<Vec<VectorHit>>;
}

#[async_trait]
impl VectorIndex for PgVectorIndex {
    async fn upsert(&self, id: &str, kind: &str, vector: &[f32], metadata: &Value) -> Result<()> {
        PgVectorIndex::upsert(self, id, kind, vector, metadata).await
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        kind: Option<&str>,
    ) -> Result<Vec<VectorHit>> {
        PgVectorIndex::query(self, vector, top_k, kind).await
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Dispatch a notification for genuinely newly committed items.
    async fn notify(&self, events: &[Event], opportunities: &[Opportunity]) -> Result<()>;
}
