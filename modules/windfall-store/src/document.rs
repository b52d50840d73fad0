//! Postgres persistence for pipeline documents.
//!
//! Every collection is a two-column JSONB table keyed by its natural
//! identifier (article link, event key, opportunity name, ...). Upserts
//! compile the collection's declarative merge table into a single
//! `INSERT ... ON CONFLICT DO UPDATE` statement, so concurrent runs
//! touching the same document converge without locks: arrays union,
//! numeric monotone fields take GREATEST, scalars overwrite (null never
//! erases existing data).

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use serde_json::Value;
use sqlx::PgPool;
use tracing::debug;

use windfall_common::config::RunSettings;
use windfall_common::merge::{MergeStrategy, MergeTable, ARTICLE_MERGE, EVENT_MERGE, OPPORTUNITY_MERGE};
use windfall_common::types::{Article, Event, Opportunity, RunAudit, Source, WatchlistEntity};

const COLLECTIONS: &[&str] = &[
    "articles",
    "events",
    "opportunities",
    "watchlist",
    "sources",
    "settings",
    "run_audits",
];

const SETTINGS_KEY: &str = "run_settings";

#[derive(Clone)]
pub struct DocStore {
    pool: PgPool,
}

impl DocStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Create collection tables if they do not exist. Idempotent.
    pub async fn migrate(&self) -> Result<()> {
        for collection in COLLECTIONS {
            let ddl = format!(
                r#"
                CREATE TABLE IF NOT EXISTS {collection} (
                    key TEXT PRIMARY KEY,
                    doc JSONB NOT NULL,
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
                )
                "#
            );
            sqlx::query(&ddl).execute(&self.pool).await?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Generic document ops
    // -----------------------------------------------------------------------

    async fn get_doc(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        let row: Option<(Value,)> =
            sqlx::query_as(&format!("SELECT doc FROM {collection} WHERE key = $1"))
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(doc,)| doc))
    }

    async fn all_docs(&self, collection: &str) -> Result<Vec<Value>> {
        let rows: Vec<(Value,)> =
            sqlx::query_as(&format!("SELECT doc FROM {collection} ORDER BY key"))
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(doc,)| doc).collect())
    }

    async fn existing_keys(&self, collection: &str, keys: &[String]) -> Result<HashSet<String>> {
        if keys.is_empty() {
            return Ok(HashSet::new());
        }
        let rows: Vec<(String,)> =
            sqlx::query_as(&format!("SELECT key FROM {collection} WHERE key = ANY($1)"))
                .bind(keys)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(k,)| k).collect())
    }

    /// Merge-aware upsert. The ON CONFLICT expression is compiled from the
    /// collection's merge table, so the write is a single round trip.
    async fn upsert_merged(&self, table: &MergeTable, key: &str, doc: &Value) -> Result<()> {
        let sql = upsert_sql(table);
        debug!(collection = table.collection, key, "Upserting document");
        sqlx::query(&sql)
            .bind(key)
            .bind(doc)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Plain last-writer-wins upsert for collections without a merge table.
    async fn upsert_plain(&self, collection: &str, key: &str, doc: &Value) -> Result<()> {
        let sql = format!(
            r#"
            INSERT INTO {collection} (key, doc, updated_at) VALUES ($1, $2, now())
            ON CONFLICT (key) DO UPDATE SET doc = EXCLUDED.doc, updated_at = now()
            "#
        );
        sqlx::query(&sql).bind(key).bind(doc).execute(&self.pool).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Articles
    // -----------------------------------------------------------------------

    /// Subset of `links` whose articles a prior run already carried past
    /// the scraped stage. Still-scraped backlog links do not count.
    pub async fn processed_article_links(&self, links: &[String]) -> Result<HashSet<String>> {
        if links.is_empty() {
            return Ok(HashSet::new());
        }
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT key FROM articles WHERE key = ANY($1) AND doc->>'status' <> 'scraped'",
        )
        .bind(links)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(k,)| k).collect())
    }

    /// Articles still in `scraped` status, optionally filtered by country
    /// and/or source names. Oldest first.
    pub async fn scraped_articles(
        &self,
        country: Option<&str>,
        sources: Option<&[String]>,
    ) -> Result<Vec<Article>> {
        let mut sql = String::from("SELECT doc FROM articles WHERE doc->>'status' = 'scraped'");
        if country.is_some() {
            sql.push_str(" AND doc->>'country' = $1");
        }
        if sources.is_some() {
            sql.push_str(if country.is_some() {
                " AND doc->>'source' = ANY($2)"
            } else {
                " AND doc->>'source' = ANY($1)"
            });
        }
        sql.push_str(" ORDER BY doc->>'scraped_at'");

        let mut query = sqlx::query_as::<_, (Value,)>(&sql);
        if let Some(country) = country {
            query = query.bind(country.to_string());
        }
        if let Some(sources) = sources {
            query = query.bind(sources.to_vec());
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|(doc,)| serde_json::from_value(doc).map_err(Into::into))
            .collect()
    }

    pub async fn article_by_link(&self, link: &str) -> Result<Option<Article>> {
        let doc = self.get_doc("articles", link).await?;
        doc.map(|d| serde_json::from_value(d).map_err(Into::into))
            .transpose()
    }

    pub async fn upsert_article(&self, article: &Article) -> Result<()> {
        let doc = serde_json::to_value(article)?;
        self.upsert_merged(&ARTICLE_MERGE, &article.link, &doc).await
    }

    pub async fn upsert_articles(&self, articles: &[Article]) -> Result<()> {
        for article in articles {
            self.upsert_article(article).await?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    pub async fn event_by_key(&self, event_key: &str) -> Result<Option<Event>> {
        let doc = self.get_doc("events", event_key).await?;
        doc.map(|d| serde_json::from_value(d).map_err(Into::into))
            .transpose()
    }

    pub async fn existing_event_keys(&self, keys: &[String]) -> Result<HashSet<String>> {
        self.existing_keys("events", keys).await
    }

    pub async fn upsert_event(&self, event: &Event) -> Result<()> {
        let doc = serde_json::to_value(event)?;
        self.upsert_merged(&EVENT_MERGE, &event.event_key, &doc).await
    }

    // -----------------------------------------------------------------------
    // Opportunities
    // -----------------------------------------------------------------------

    pub async fn opportunity_by_name(&self, name: &str) -> Result<Option<Opportunity>> {
        let doc = self.get_doc("opportunities", name).await?;
        doc.map(|d| serde_json::from_value(d).map_err(Into::into))
            .transpose()
    }

    pub async fn upsert_opportunity(&self, opportunity: &Opportunity) -> Result<()> {
        let doc = serde_json::to_value(opportunity)?;
        self.upsert_merged(&OPPORTUNITY_MERGE, &opportunity.name, &doc)
            .await
    }

    // -----------------------------------------------------------------------
    // Watchlist
    // -----------------------------------------------------------------------

    pub async fn watchlist_entities(&self) -> Result<Vec<WatchlistEntity>> {
        let docs = self.all_docs("watchlist").await?;
        docs.into_iter()
            .map(|d| serde_json::from_value(d).map_err(Into::into))
            .collect()
    }

    pub async fn upsert_watchlist_entity(&self, entity: &WatchlistEntity) -> Result<()> {
        let doc = serde_json::to_value(entity)?;
        self.upsert_plain("watchlist", &entity.name, &doc).await
    }

    /// Append a search alias to a watchlist entity's terms (set semantics),
    /// done in SQL so concurrent appends cannot clobber each other.
    pub async fn add_watchlist_alias(&self, entity_name: &str, alias: &str) -> Result<()> {
        let sql = r#"
            UPDATE watchlist
            SET doc = jsonb_set(doc, '{terms}', (
                SELECT coalesce(jsonb_agg(DISTINCT elem), '[]'::jsonb)
                FROM jsonb_array_elements(coalesce(doc->'terms', '[]'::jsonb) || $2::jsonb) AS elem
            )),
            updated_at = now()
            WHERE key = $1
            "#;
        sqlx::query(sql)
            .bind(entity_name)
            .bind(serde_json::json!([alias]))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Sources
    // -----------------------------------------------------------------------

    pub async fn sources(&self) -> Result<Vec<Source>> {
        let docs = self.all_docs("sources").await?;
        docs.into_iter()
            .map(|d| serde_json::from_value(d).map_err(Into::into))
            .collect()
    }

    pub async fn sources_by_names(&self, names: &[String]) -> Result<HashMap<String, Source>> {
        if names.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(Value,)> =
            sqlx::query_as("SELECT doc FROM sources WHERE key = ANY($1)")
                .bind(names)
                .fetch_all(&self.pool)
                .await?;
        let mut out = HashMap::new();
        for (doc,) in rows {
            let source: Source = serde_json::from_value(doc)?;
            out.insert(source.name.clone(), source);
        }
        Ok(out)
    }

    pub async fn upsert_source(&self, source: &Source) -> Result<()> {
        let doc = serde_json::to_value(source)?;
        self.upsert_plain("sources", &source.name, &doc).await
    }

    // -----------------------------------------------------------------------
    // Settings
    // -----------------------------------------------------------------------

    /// Load the run settings snapshot, falling back to defaults when the
    /// settings document is absent.
    pub async fn run_settings(&self) -> Result<RunSettings> {
        match self.get_doc("settings", SETTINGS_KEY).await? {
            Some(doc) => Ok(serde_json::from_value(doc)?),
            None => Ok(RunSettings::default()),
        }
    }

    pub async fn save_run_settings(&self, settings: &RunSettings) -> Result<()> {
        let doc = serde_json::to_value(settings)?;
        self.upsert_plain("settings", SETTINGS_KEY, &doc).await
    }

    // -----------------------------------------------------------------------
    // Run audits (write-once)
    // -----------------------------------------------------------------------

    pub async fn insert_run_audit(&self, audit: &RunAudit) -> Result<()> {
        let doc = serde_json::to_value(audit)?;
        sqlx::query("INSERT INTO run_audits (key, doc) VALUES ($1, $2)")
            .bind(&audit.run_id)
            .bind(&doc)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SQL generation from merge tables
// ---------------------------------------------------------------------------

/// Compile a merge table into an `INSERT ... ON CONFLICT DO UPDATE` statement.
/// Field and collection names come from static tables, never from input.
fn upsert_sql(table: &MergeTable) -> String {
    let collection = table.collection;
    let mut patches: Vec<String> = Vec::new();

    for (field, strategy) in table.fields {
        let patch = match strategy {
            MergeStrategy::Overwrite => format!(
                "CASE WHEN EXCLUDED.doc ? '{field}' AND EXCLUDED.doc->'{field}' <> 'null'::jsonb \
                 THEN jsonb_build_object('{field}', EXCLUDED.doc->'{field}') \
                 ELSE '{{}}'::jsonb END"
            ),
            MergeStrategy::UnionArray => format!(
                "jsonb_build_object('{field}', (\
                 SELECT coalesce(jsonb_agg(DISTINCT elem), '[]'::jsonb) \
                 FROM jsonb_array_elements(\
                 coalesce({collection}.doc->'{field}', '[]'::jsonb) || \
                 coalesce(EXCLUDED.doc->'{field}', '[]'::jsonb)) AS elem))"
            ),
            MergeStrategy::Max => format!(
                // numeric keeps JSON number forms exact: integers never
                // pick up a fractional part on the way through GREATEST.
                "jsonb_build_object('{field}', to_jsonb(GREATEST(\
                 coalesce(({collection}.doc->>'{field}')::numeric, 0), \
                 coalesce((EXCLUDED.doc->>'{field}')::numeric, 0))))"
            ),
        };
        patches.push(patch);
    }

    format!(
        "INSERT INTO {collection} (key, doc, updated_at) VALUES ($1, $2, now()) \
         ON CONFLICT (key) DO UPDATE SET updated_at = now(), doc = {collection}.doc || {}",
        patches.join(" || ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_sql_covers_every_strategy() {
        let sql = upsert_sql(&OPPORTUNITY_MERGE);
        assert!(sql.contains("ON CONFLICT (key) DO UPDATE"));
        // UnionArray fields aggregate distinct elements
        assert!(sql.contains("jsonb_array_elements"));
        assert!(sql.contains("'reasons_to_contact'"));
        // Max fields use GREATEST over numeric, never a float cast that
        // would turn stored integers into 80.0
        assert!(sql.contains("GREATEST"));
        assert!(sql.contains("::numeric"));
        assert!(!sql.contains("double precision"));
        assert!(sql.contains("'wealth_estimate_musd'"));
        // Overwrite fields guard against null erasure
        assert!(sql.contains("'biography'"));
        assert!(sql.contains("<> 'null'::jsonb"));
    }

    #[test]
    fn upsert_sql_targets_collection_table() {
        let sql = upsert_sql(&EVENT_MERGE);
        assert!(sql.starts_with("INSERT INTO events"));
        assert!(sql.contains("events.doc"));
    }
}
