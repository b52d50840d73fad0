//! Context enrichment for one cluster: named entities, semantically similar
//! historical coverage, encyclopedia background, and recent related news.
//! Everything here is additive color for synthesis, so every lookup degrades
//! to empty on failure.

use tracing::warn;

use windfall_common::config::RunSettings;

use crate::llm::{ArticleDigest, EventContext};

use super::Pipeline;

/// Entities looked up in the encyclopedia per cluster.
const ENCYCLOPEDIA_LOOKUPS: usize = 5;
/// Recent-news snippets kept per cluster.
const NEWS_SNIPPETS: usize = 5;

impl Pipeline {
    pub(crate) async fn build_context(
        &self,
        cluster_key: &str,
        articles: &[ArticleDigest],
        settings: &RunSettings,
    ) -> EventContext {
        let max_score = articles.iter().map(|a| a.score).max().unwrap_or(0);
        let primary = articles.iter().max_by_key(|a| a.score);
        let country = primary.map(|a| a.country.clone()).unwrap_or_default();

        let combined: String = articles
            .iter()
            .map(|a| format!("{}\n{}", a.title, a.summary))
            .collect::<Vec<_>>()
            .join("\n\n");

        let entities = match self.composer.extract_entities(&combined).await {
            Ok(entities) => entities,
            Err(e) => {
                warn!(cluster = cluster_key, error = %e, "Entity extraction failed");
                Vec::new()
            }
        };

        let historical = self.historical_snippets(cluster_key, &combined, articles, settings).await;

        let mut encyclopedia = Vec::new();
        for entity in entities.iter().take(ENCYCLOPEDIA_LOOKUPS) {
            match self.fetcher.encyclopedia(entity).await {
                Ok(Some(summary)) => encyclopedia.push((entity.clone(), summary)),
                Ok(None) => {}
                Err(e) => warn!(entity = %entity, error = %e, "Encyclopedia lookup failed"),
            }
        }

        let recent_news = match primary {
            Some(primary) => match self.fetcher.news(&primary.title).await {
                Ok(results) => results
                    .into_iter()
                    .take(NEWS_SNIPPETS)
                    .map(|r| format!("{}: {}", r.title, r.snippet))
                    .collect(),
                Err(e) => {
                    warn!(cluster = cluster_key, error = %e, "Recent-news lookup failed");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        EventContext {
            cluster_key: cluster_key.to_string(),
            country,
            max_score,
            articles: articles.to_vec(),
            entities,
            historical,
            encyclopedia,
            recent_news,
        }
    }

    /// Nearest historical articles by embedding similarity, excluding the
    /// cluster's own members.
    async fn historical_snippets(
        &self,
        cluster_key: &str,
        combined: &str,
        articles: &[ArticleDigest],
        settings: &RunSettings,
    ) -> Vec<String> {
        let vector = match self.embedder.embed(combined).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!(cluster = cluster_key, error = %e, "Context embedding failed");
                return Vec::new();
            }
        };

        let hits = match self
            .vectors
            .query(&vector, settings.context_neighbors, Some("article"))
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                warn!(cluster = cluster_key, error = %e, "Historical lookup failed");
                return Vec::new();
            }
        };

        hits.into_iter()
            .filter(|hit| {
                let link = hit.metadata.get("link").and_then(|v| v.as_str());
                !articles.iter().any(|a| Some(a.link.as_str()) == link)
            })
            .filter_map(|hit| {
                let title = hit.metadata.get("title")?.as_str()?.to_string();
                let summary = hit
                    .metadata
                    .get("summary")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                Some(format!("{title}: {summary}"))
            })
            .collect()
    }
}
