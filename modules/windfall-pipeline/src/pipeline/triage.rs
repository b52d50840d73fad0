//! Batched headline triage. Headlines go to the classifier in fixed-size
//! batches; a failed batch is retried once, then degraded to per-item calls
//! so one bad batch never takes down the whole run.

use std::collections::HashMap;

use anyhow::Result;
use tracing::{info, warn};

use windfall_common::types::{Article, ArticleStatus, Stage};

use crate::llm::{HeadlineForAssessment, HeadlineVerdict};
use crate::watchlist::WatchlistMatcher;

use super::state::RunContext;
use super::Pipeline;

pub(crate) struct TriageOutput {
    pub relevant: Vec<Article>,
    pub dropped: Vec<Article>,
}

enum ItemOutcome {
    Assessed { verdict: HeadlineVerdict, fallback: bool },
    Failed { reason: String },
}

impl Pipeline {
    pub(crate) async fn triage_headlines(
        &self,
        fresh: Vec<Article>,
        ctx: &mut RunContext,
    ) -> Result<TriageOutput> {
        if fresh.is_empty() {
            return Ok(TriageOutput {
                relevant: Vec::new(),
                dropped: Vec::new(),
            });
        }

        let entities = self.store.watchlist_entities().await?;
        let matcher = WatchlistMatcher::new(&entities);

        let hits: Vec<Vec<String>> = fresh
            .iter()
            .map(|a| matcher.matches(&a.title, &a.country))
            .collect();
        let items: Vec<HeadlineForAssessment> = fresh
            .iter()
            .zip(&hits)
            .map(|(a, h)| HeadlineForAssessment {
                title: a.title.clone(),
                country: a.country.clone(),
                watchlist_hits: h.clone(),
            })
            .collect();

        let batch_size = ctx.settings.batch_size.max(1);
        let mut outcomes = Vec::with_capacity(items.len());
        for chunk in items.chunks(batch_size) {
            outcomes.extend(self.classify_chunk(chunk).await);
        }

        let threshold = ctx.settings.headline_relevance_threshold;
        let boost = i64::from(ctx.settings.watchlist_boost);

        let mut relevant = Vec::new();
        let mut dropped = Vec::new();
        let mut hit_counts: HashMap<String, u32> = HashMap::new();

        for ((mut article, outcome), article_hits) in fresh.into_iter().zip(outcomes).zip(hits) {
            match outcome {
                ItemOutcome::Assessed { verdict, fallback } => {
                    let raw = if article_hits.is_empty() {
                        verdict.score
                    } else {
                        (verdict.score + boost).min(100)
                    };
                    article.set_headline_score(raw, verdict.rationale);
                    ctx.funnel.headlines_assessed += 1;

                    for name in &article_hits {
                        *hit_counts.entry(name.clone()).or_default() += 1;
                    }

                    let score = article.headline_score.unwrap_or(0);
                    if score >= threshold {
                        let status = if fallback { "relevant_fallback" } else { "relevant" };
                        article.record(Stage::Triage, status, format!("headline score {score}"));
                        relevant.push(article);
                    } else {
                        article.status = ArticleStatus::Dropped;
                        article.record(
                            Stage::Triage,
                            "dropped",
                            format!("headline score {score} below threshold {threshold}"),
                        );
                        dropped.push(article);
                    }
                }
                ItemOutcome::Failed { reason } => {
                    article.status = ArticleStatus::Dropped;
                    article.record(Stage::Triage, "failed", &reason);
                    warn!(link = %article.link, reason = %reason, "Headline classification failed");
                    dropped.push(article);
                }
            }
        }

        ctx.funnel.relevant_headlines = relevant.len() as u32;

        // Persist watchlist hit counts; losing a count is not worth a run abort.
        for entity in entities {
            if let Some(count) = hit_counts.get(&entity.name) {
                let mut updated = entity;
                updated.hit_count += count;
                if let Err(e) = self.store.upsert_watchlist_entity(&updated).await {
                    warn!(entity = %updated.name, error = %e, "Failed to update watchlist hit count");
                }
            }
        }

        info!(
            assessed = ctx.funnel.headlines_assessed,
            relevant = relevant.len(),
            dropped = dropped.len(),
            "Headline triage complete"
        );
        Ok(TriageOutput { relevant, dropped })
    }

    /// One batch: attempt, retry once, then degrade to per-item calls so a
    /// single stubborn batch still yields a verdict per headline.
    async fn classify_chunk(&self, chunk: &[HeadlineForAssessment]) -> Vec<ItemOutcome> {
        for attempt in 1..=2 {
            match self.headlines.assess_batch(chunk).await {
                Ok(verdicts) => {
                    return verdicts
                        .into_iter()
                        .map(|verdict| ItemOutcome::Assessed {
                            verdict,
                            fallback: false,
                        })
                        .collect();
                }
                Err(e) => {
                    warn!(attempt, count = chunk.len(), error = %e, "Batch classification failed");
                }
            }
        }

        let mut outcomes = Vec::with_capacity(chunk.len());
        for item in chunk {
            match self.headlines.assess_single(item).await {
                Ok(verdict) => outcomes.push(ItemOutcome::Assessed {
                    verdict,
                    fallback: true,
                }),
                Err(e) => outcomes.push(ItemOutcome::Failed {
                    reason: e.to_string(),
                }),
            }
        }
        outcomes
    }
}
