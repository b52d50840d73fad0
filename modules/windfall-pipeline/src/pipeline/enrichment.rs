//! Content enrichment: fetch each relevant article's body and assess it in
//! full, with a bounded worker pool. Failed scrapes of high-signal headlines
//! enter salvage: a capped number of alternative-source fetches found via
//! web search, accepted only when the alternative body itself assesses as
//! relevant.

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use windfall_common::config::RunSettings;
use windfall_common::types::{clamp_score, Article, ArticleStatus, Stage};

use super::state::RunContext;
use super::Pipeline;

pub(crate) struct EnrichmentOutput {
    pub enriched: Vec<Article>,
    pub dropped: Vec<Article>,
}

impl Pipeline {
    /// Infallible by design: every per-article failure becomes a trail entry
    /// and a drop, never a run abort.
    pub(crate) async fn enrich_articles(
        &self,
        relevant: Vec<Article>,
        ctx: &mut RunContext,
    ) -> EnrichmentOutput {
        let settings = &ctx.settings;
        let concurrency = settings.enrichment_concurrency.max(1);

        let results: Vec<Article> = stream::iter(
            relevant
                .into_iter()
                .map(|article| self.enrich_one(article, settings)),
        )
        .buffer_unordered(concurrency)
        .collect()
        .await;

        let mut enriched = Vec::new();
        let mut dropped = Vec::new();
        for article in results {
            // Only this run's trail entries count toward salvage stats;
            // refresh mode rehydrates prior trails.
            let salvaged = article
                .trail
                .iter()
                .any(|t| t.stage == Stage::Salvage && t.status == "accepted" && t.at >= ctx.started_at);
            let salvage_failed = article
                .trail
                .iter()
                .any(|t| t.stage == Stage::Salvage && t.status == "failed" && t.at >= ctx.started_at);
            if salvaged {
                ctx.funnel.articles_salvaged += 1;
            }
            if salvage_failed {
                ctx.funnel.salvage_failed += 1;
            }

            if article.status == ArticleStatus::Enriched {
                ctx.funnel.articles_enriched += 1;
                enriched.push(article);
            } else {
                ctx.funnel.articles_dropped += 1;
                dropped.push(article);
            }
        }

        info!(
            enriched = enriched.len(),
            dropped = dropped.len(),
            salvaged = ctx.funnel.articles_salvaged,
            "Content enrichment complete"
        );
        EnrichmentOutput { enriched, dropped }
    }

    async fn enrich_one(&self, mut article: Article, settings: &RunSettings) -> Article {
        let content = match self.fetcher.page(&article.link).await {
            Ok(page) if !page.text.trim().is_empty() => Some(page.text),
            Ok(_) => {
                article.record(Stage::Enrichment, "scrape_failed", "fetch returned empty content");
                None
            }
            Err(e) => {
                article.record(Stage::Enrichment, "scrape_failed", e.to_string());
                None
            }
        };

        let Some(content) = content else {
            if article.best_score() < settings.high_signal_headline_threshold {
                article.record(
                    Stage::Enrichment,
                    "dropped",
                    "scrape failed and headline is not high-signal",
                );
                article.status = ArticleStatus::Dropped;
                return article;
            }
            return self.salvage(article, settings).await;
        };

        self.assess_content(article, &content).await
    }

    async fn assess_content(&self, mut article: Article, content: &str) -> Article {
        // Scope triage is a cheap gate; if the gate itself errors we pay
        // for the full assessment rather than losing the article.
        match self.assessor.triage(&article.title, content).await {
            Ok(verdict) if !verdict.in_scope => {
                article.record(
                    Stage::Enrichment,
                    "dropped",
                    format!("out of scope: {}", verdict.reason),
                );
                article.status = ArticleStatus::Dropped;
                return article;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(link = %article.link, error = %e, "Scope triage failed, assessing anyway");
            }
        }

        match self.assessor.assess(&article.title, content).await {
            Ok(assessment) => {
                article.set_content_score(assessment.score);
                article.content_summary = Some(assessment.summary);
                article.key_individuals = assessment
                    .key_individuals
                    .into_iter()
                    .map(Into::into)
                    .collect();
                article.status = ArticleStatus::Enriched;
                article.record(
                    Stage::Enrichment,
                    "enriched",
                    format!("content score {}", article.content_score.unwrap_or(0)),
                );
            }
            Err(e) => {
                article.record(Stage::Enrichment, "failed", e.to_string());
                article.status = ArticleStatus::Dropped;
            }
        }
        article
    }

    /// Alternative-source recovery for a high-signal headline whose own page
    /// would not scrape. Accepts the first alternative whose body assesses
    /// at or above the article relevance threshold.
    async fn salvage(&self, mut article: Article, settings: &RunSettings) -> Article {
        let results = match self.fetcher.search(&article.title).await {
            Ok(results) => results,
            Err(e) => {
                article.record(
                    Stage::Salvage,
                    "failed",
                    format!("alternative-source search failed: {e}"),
                );
                article.status = ArticleStatus::Dropped;
                return article;
            }
        };

        let mut attempts = 0;
        for result in results {
            if result.url == article.link {
                continue;
            }
            if attempts >= settings.salvage_attempts {
                break;
            }
            attempts += 1;

            let page = match self.fetcher.page(&result.url).await {
                Ok(page) if !page.text.trim().is_empty() => page,
                Ok(_) => continue,
                Err(e) => {
                    warn!(url = %result.url, error = %e, "Salvage fetch failed");
                    continue;
                }
            };

            match self.assessor.assess(&article.title, &page.text).await {
                Ok(assessment)
                    if clamp_score(assessment.score) >= settings.article_relevance_threshold =>
                {
                    article.record(
                        Stage::Salvage,
                        "accepted",
                        format!("recovered from {}", result.url),
                    );
                    article.set_content_score(assessment.score);
                    article.content_summary = Some(assessment.summary);
                    article.key_individuals = assessment
                        .key_individuals
                        .into_iter()
                        .map(Into::into)
                        .collect();
                    article.status = ArticleStatus::Enriched;
                    return article;
                }
                Ok(assessment) => {
                    warn!(
                        url = %result.url,
                        score = assessment.score,
                        "Salvage candidate below relevance threshold"
                    );
                }
                Err(e) => {
                    warn!(url = %result.url, error = %e, "Salvage assessment failed");
                }
            }
        }

        article.record(
            Stage::Salvage,
            "failed",
            format!("no alternative source passed after {attempts} attempts"),
        );
        article.status = ArticleStatus::Dropped;
        article
    }
}
