//! Event clustering and synthesis. Enriched articles above the relevance
//! threshold are clustered by underlying occurrence, unclustered high
//! scorers are promoted to singleton clusters, and each cluster is
//! synthesized into candidate events plus candidate opportunities with a
//! bounded worker pool.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use windfall_common::config::RunSettings;
use windfall_common::types::{Article, Event};

use crate::llm::{ArticleDigest, CandidateOpportunity, ClusterAssignment};

use super::state::RunContext;
use super::Pipeline;

pub(crate) struct SynthesisOutput {
    pub events: Vec<Event>,
    /// (event_key, candidate) pairs for the resolver.
    pub candidates: Vec<(String, CandidateOpportunity)>,
}

#[derive(Default)]
struct ClusterResult {
    events: Vec<Event>,
    candidates: Vec<(String, CandidateOpportunity)>,
    below_threshold: u32,
    errors: Vec<String>,
}

impl Pipeline {
    pub(crate) async fn synthesize_events(
        &self,
        enriched: &[Article],
        ctx: &mut RunContext,
    ) -> Result<SynthesisOutput> {
        let article_threshold = ctx.settings.article_relevance_threshold;
        let digests: Vec<ArticleDigest> = enriched
            .iter()
            .filter(|a| a.best_score() >= article_threshold)
            .map(|a| ArticleDigest {
                link: a.link.clone(),
                title: a.title.clone(),
                summary: a.content_summary.clone().unwrap_or_default(),
                score: a.best_score(),
                country: a.country.clone(),
            })
            .collect();

        if digests.is_empty() {
            info!("No articles eligible for synthesis");
            return Ok(SynthesisOutput {
                events: Vec::new(),
                candidates: Vec::new(),
            });
        }

        let clusters = self.cluster_digests(&digests, ctx).await;
        let settings = &ctx.settings;

        let by_link: HashMap<&str, &ArticleDigest> =
            digests.iter().map(|d| (d.link.as_str(), d)).collect();

        let concurrency = settings.synthesis_concurrency.max(1);
        let work = clusters.into_iter().filter_map(|cluster| {
            let members: Vec<ArticleDigest> = cluster
                .article_links
                .iter()
                .filter_map(|link| by_link.get(link.as_str()).map(|d| (*d).clone()))
                .collect();
            if members.is_empty() {
                warn!(cluster = %cluster.cluster_key, "Cluster references no known article links");
                return None;
            }
            Some(self.synthesize_cluster(cluster.cluster_key, members, settings))
        });

        let results: Vec<ClusterResult> = stream::iter(work)
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut events = Vec::new();
        let mut candidates = Vec::new();
        for result in results {
            ctx.funnel.events_below_threshold += result.below_threshold;
            ctx.errors.extend(result.errors);
            candidates.extend(result.candidates);
            events.extend(result.events);
        }
        ctx.funnel.events_synthesized = events.len() as u32;

        info!(
            events = events.len(),
            below_threshold = ctx.funnel.events_below_threshold,
            candidates = candidates.len(),
            "Event synthesis complete"
        );
        Ok(SynthesisOutput { events, candidates })
    }

    /// Cluster with one retry, then degrade to no clusters; singleton
    /// promotion still runs, so a clustering outage loses grouping but not
    /// the strongest stories.
    async fn cluster_digests(
        &self,
        digests: &[ArticleDigest],
        ctx: &mut RunContext,
    ) -> Vec<ClusterAssignment> {
        let mut clusters = Vec::new();
        for attempt in 1..=2 {
            match self.composer.cluster(digests).await {
                Ok(assigned) => {
                    clusters = assigned;
                    break;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Clustering failed");
                    if attempt == 2 {
                        ctx.errors
                            .push(format!("clustering degraded to singletons: {e}"));
                    }
                }
            }
        }

        let clustered: HashSet<String> = clusters
            .iter()
            .flat_map(|c| c.article_links.iter().cloned())
            .collect();
        let mut used_keys: HashSet<String> =
            clusters.iter().map(|c| c.cluster_key.clone()).collect();

        for digest in digests {
            if clustered.contains(digest.link.as_str()) {
                continue;
            }
            if digest.score < ctx.settings.singleton_promotion_threshold {
                continue;
            }
            let mut key = slug(&digest.title);
            if !used_keys.insert(key.clone()) {
                key = format!("{key}-solo");
                used_keys.insert(key.clone());
            }
            clusters.push(ClusterAssignment {
                cluster_key: key,
                article_links: vec![digest.link.clone()],
            });
        }
        clusters
    }

    async fn synthesize_cluster(
        &self,
        cluster_key: String,
        members: Vec<ArticleDigest>,
        settings: &RunSettings,
    ) -> ClusterResult {
        let mut result = ClusterResult::default();
        let context = self.build_context(&cluster_key, &members, settings).await;

        let candidates = match self.composer.synthesize(&context).await {
            Ok(candidates) => candidates,
            Err(e) => {
                result
                    .errors
                    .push(format!("synthesis failed for cluster {cluster_key}: {e}"));
                return result;
            }
        };

        if context.max_score < settings.event_relevance_threshold {
            result.below_threshold = candidates.len() as u32;
            info!(
                cluster = %cluster_key,
                max_score = context.max_score,
                "Cluster below event relevance threshold"
            );
            return result;
        }

        let source_links: Vec<String> = members.iter().map(|m| m.link.clone()).collect();
        for (i, candidate) in candidates.into_iter().enumerate() {
            // The first candidate inherits the cluster key verbatim so
            // repeated runs converge on the same event document.
            let event_key = if i == 0 {
                cluster_key.clone()
            } else {
                format!("{cluster_key}-{}", i + 1)
            };

            let event = Event {
                event_key: event_key.clone(),
                headline: candidate.headline,
                summary: candidate.summary,
                country: context.country.clone(),
                classification: candidate.classification,
                source_links: source_links.clone(),
                highest_relevance_score: context.max_score,
                key_individuals: candidate
                    .key_individuals
                    .into_iter()
                    .map(Into::into)
                    .collect(),
                opportunity_names: Vec::new(),
                created_at: Utc::now(),
            };

            match self
                .composer
                .generate_opportunities(&event.headline, &event.summary, &context)
                .await
            {
                Ok(opportunities) => {
                    result
                        .candidates
                        .extend(opportunities.into_iter().map(|o| (event_key.clone(), o)));
                }
                Err(e) => {
                    warn!(event_key = %event_key, error = %e, "Opportunity generation failed");
                }
            }
            result.events.push(event);
        }
        result
    }
}

/// Kebab-case key for a promoted singleton, derived from its title.
fn slug(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .take(8)
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::slug;

    #[test]
    fn slug_is_kebab_and_bounded() {
        assert_eq!(
            slug("Müller family sells packaging group to PE buyer!"),
            "müller-family-sells-packaging-group-to-pe-buyer"
        );
        let long = slug("one two three four five six seven eight nine ten");
        assert_eq!(long, "one-two-three-four-five-six-seven-eight");
    }
}
