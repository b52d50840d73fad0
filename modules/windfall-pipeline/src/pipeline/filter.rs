//! Fresh-article filter: dedups scraped headlines against articles already
//! processed by a prior run. Read-only; the only mutation is on the
//! in-memory articles.

use anyhow::Result;
use tracing::info;

use windfall_common::types::{Article, Stage};

use super::state::RunContext;
use super::Pipeline;

impl Pipeline {
    /// Normal mode: keep only headlines a prior run has not already carried
    /// past the scraped stage; the store's still-scraped backlog is fresh.
    /// Refresh mode: keep everything, rehydrating the persisted document id
    /// (and trail) for processed links so downstream stages update in place.
    pub(crate) async fn filter_fresh(
        &self,
        scraped: Vec<Article>,
        refresh: bool,
        ctx: &mut RunContext,
    ) -> Result<Vec<Article>> {
        let links: Vec<String> = scraped.iter().map(|a| a.link.clone()).collect();
        let processed = self.store.processed_article_links(&links).await?;

        let mut fresh = Vec::new();
        for mut article in scraped {
            if processed.contains(&article.link) {
                if !refresh {
                    continue;
                }
                if let Some(prior) = self.store.article_by_link(&article.link).await? {
                    article.id = prior.id;
                    article.trail = prior.trail;
                }
                article.record(Stage::Filter, "refreshed", "already processed, reprocessing");
            } else {
                article.record(Stage::Filter, "fresh", "not yet processed");
            }
            fresh.push(article);
        }

        ctx.funnel.fresh_headlines = fresh.len() as u32;
        info!(
            scraped = ctx.funnel.headlines_scraped,
            fresh = fresh.len(),
            refresh,
            "Fresh-article filter complete"
        );
        Ok(fresh)
    }
}
