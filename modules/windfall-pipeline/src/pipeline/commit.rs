//! Idempotent commit and per-source analytics. Everything persisted here is
//! keyed by a natural key (article link, event key, canonical dossier name),
//! so re-running the same inputs converges instead of duplicating.
//! Embedding-index writes and notification dispatch are best-effort.

use std::collections::HashMap;

use anyhow::Result;
use serde_json::json;
use tracing::{info, warn};
use url::Url;

use windfall_common::types::{
    Article, ArticleStatus, Event, Opportunity, Source, SourceAnalytics, Stage,
};

use super::state::RunContext;
use super::Pipeline;

/// Consecutive scrape failures before a source is flagged for maintenance.
const FAILING_SOURCE_RUNS: u32 = 3;

#[derive(Default)]
struct SourceTally {
    country: String,
    url: String,
    scraped: u32,
    relevant: u32,
    scrape_failures: u32,
}

impl Pipeline {
    pub(crate) async fn commit_run(
        &self,
        events: Vec<Event>,
        opportunities: Vec<Opportunity>,
        mut articles: Vec<Article>,
        created: &[String],
        ctx: &mut RunContext,
    ) -> Result<Vec<String>> {
        // Which event keys are genuinely new has to be read before the
        // upserts make everything look pre-existing.
        let keys: Vec<String> = events.iter().map(|e| e.event_key.clone()).collect();
        let existing = self.store.existing_event_keys(&keys).await?;

        for event in &events {
            self.store.upsert_event(event).await?;
            ctx.funnel.events_committed += 1;
            self.index_event(event).await;
        }

        for article in &mut articles {
            article.record(Stage::Commit, "persisted", "");
            self.store.upsert_article(article).await?;
            if article.status == ArticleStatus::Enriched {
                self.index_article(article).await;
            }
        }

        for opportunity in &opportunities {
            self.store.upsert_opportunity(opportunity).await?;
            self.index_opportunity(opportunity).await;
        }

        let flagged = self.update_source_analytics(&articles, ctx).await?;

        ctx.committed_event_keys = events.iter().map(|e| e.event_key.clone()).collect();
        ctx.opportunity_names = opportunities.iter().map(|o| o.name.clone()).collect();

        // Notify only on genuinely new material, never on re-converged runs.
        let new_events: Vec<Event> = events
            .into_iter()
            .filter(|e| !existing.contains(&e.event_key))
            .collect();
        let new_opportunities: Vec<Opportunity> = opportunities
            .into_iter()
            .filter(|o| created.contains(&o.name))
            .collect();

        if !new_events.is_empty() || !new_opportunities.is_empty() {
            if let Err(e) = self.notifier.notify(&new_events, &new_opportunities).await {
                warn!(error = %e, "Notification dispatch failed");
            }
        }

        info!(
            events = ctx.funnel.events_committed,
            new_events = new_events.len(),
            opportunities = ctx.opportunity_names.len(),
            flagged_sources = flagged.len(),
            "Commit complete"
        );
        Ok(flagged)
    }

    async fn index_event(&self, event: &Event) {
        let text = format!("{}\n{}", event.headline, event.summary);
        let metadata = json!({
            "headline": event.headline,
            "summary": event.summary,
            "country": event.country,
        });
        match self.embedder.embed(&text).await {
            Ok(vector) => {
                let id = format!("event_{}", event.event_key);
                if let Err(e) = self.vectors.upsert(&id, "event", &vector, &metadata).await {
                    warn!(id = %id, error = %e, "Vector upsert failed");
                }
            }
            Err(e) => warn!(event_key = %event.event_key, error = %e, "Event embedding failed"),
        }
    }

    async fn index_article(&self, article: &Article) {
        let summary = article.content_summary.clone().unwrap_or_default();
        let text = format!("{}\n{}", article.title, summary);
        let metadata = json!({
            "title": article.title,
            "summary": summary,
            "link": article.link,
        });
        match self.embedder.embed(&text).await {
            Ok(vector) => {
                let id = format!("article_{}", article.id);
                if let Err(e) = self.vectors.upsert(&id, "article", &vector, &metadata).await {
                    warn!(id = %id, error = %e, "Vector upsert failed");
                }
            }
            Err(e) => warn!(link = %article.link, error = %e, "Article embedding failed"),
        }
    }

    async fn index_opportunity(&self, opportunity: &Opportunity) {
        if opportunity.embedding.is_empty() {
            return;
        }
        let metadata = json!({
            "name": opportunity.name,
            "wealth_estimate_musd": opportunity.wealth_estimate_musd,
        });
        let id = format!("opportunity_{}", opportunity.name);
        if let Err(e) = self
            .vectors
            .upsert(&id, "opportunity", &opportunity.embedding, &metadata)
            .await
        {
            warn!(id, error = %e, "Vector upsert failed");
        }
    }

    /// Roll this run's per-source outcomes into long-lived source analytics
    /// and return sources flagged for selector maintenance.
    async fn update_source_analytics(
        &self,
        articles: &[Article],
        ctx: &mut RunContext,
    ) -> Result<Vec<String>> {
        let mut tallies: HashMap<String, SourceTally> = HashMap::new();
        for article in articles {
            let tally = tallies.entry(article.source.clone()).or_default();
            tally.country = article.country.clone();
            if tally.url.is_empty() {
                tally.url = site_origin(&article.link);
            }
            tally.scraped += 1;
            if article.status == ArticleStatus::Enriched {
                tally.relevant += 1;
            }
            let scrape_failed = article
                .trail
                .iter()
                .any(|t| t.status == "scrape_failed" && t.at >= ctx.started_at);
            if scrape_failed {
                tally.scrape_failures += 1;
            }
        }

        if tallies.is_empty() {
            return Ok(Vec::new());
        }

        let names: Vec<String> = tallies.keys().cloned().collect();
        let mut known = self.store.sources_by_names(&names).await?;

        let mut flagged = Vec::new();
        for (name, tally) in tallies {
            let mut source = known.remove(&name).unwrap_or_else(|| Source {
                name: name.clone(),
                url: tally.url.clone(),
                country: tally.country.clone(),
                active: true,
                analytics: SourceAnalytics::default(),
            });

            source.analytics.runs += 1;
            source.analytics.headlines_scraped += tally.scraped;
            source.analytics.relevant_found += tally.relevant;
            if tally.scrape_failures > 0 {
                source.analytics.failures += tally.scrape_failures;
                source.analytics.consecutive_scrape_failures += 1;
            } else {
                source.analytics.successes += 1;
                source.analytics.consecutive_scrape_failures = 0;
            }

            if source.analytics.consecutive_scrape_failures >= FAILING_SOURCE_RUNS {
                warn!(
                    source = %name,
                    consecutive = source.analytics.consecutive_scrape_failures,
                    "Source keeps failing content scrapes"
                );
                flagged.push(name.clone());
            }

            self.store.upsert_source(&source).await?;
        }
        flagged.sort();
        Ok(flagged)
    }
}

/// Scheme-and-host origin of an article link, used as the site URL when a
/// source document is first created from analytics.
fn site_origin(link: &str) -> String {
    Url::parse(link)
        .ok()
        .filter(|u| u.has_host())
        .map(|u| u.origin().ascii_serialization())
        .unwrap_or_default()
}
