//! Opportunity resolution: collapse per-event candidate mentions into one
//! canonical dossier per person, merging into existing dossiers where they
//! exist. Persisting happens at commit; this stage only builds the final
//! opportunity values and learns name aliases along the way.

use std::collections::HashMap;

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use windfall_common::types::{normalized_name, Event, Opportunity};

use crate::llm::CandidateOpportunity;

use super::state::RunContext;
use super::Pipeline;

pub(crate) struct ResolverOutput {
    pub opportunities: Vec<Opportunity>,
    /// Names of dossiers created this run (vs. updated).
    pub created: Vec<String>,
}

/// All of one person's mentions across this run's events, keyed by
/// normalized name before canonicalization.
struct Mention {
    display: String,
    reasons: Vec<String>,
    event_keys: Vec<String>,
    wealth: f64,
}

impl Mention {
    fn new(display: &str) -> Self {
        Self {
            display: display.to_string(),
            reasons: Vec::new(),
            event_keys: Vec::new(),
            wealth: 0.0,
        }
    }

    fn add(&mut self, reason: String, event_key: &str, wealth: f64) {
        if !self.reasons.contains(&reason) {
            self.reasons.push(reason);
        }
        if !self.event_keys.iter().any(|k| k == event_key) {
            self.event_keys.push(event_key.to_string());
        }
        self.wealth = self.wealth.max(wealth);
    }
}

impl Pipeline {
    pub(crate) async fn resolve_opportunities(
        &self,
        events: &mut Vec<Event>,
        candidates: Vec<(String, CandidateOpportunity)>,
        ctx: &mut RunContext,
    ) -> Result<ResolverOutput> {
        let mentions = collect_mentions(events, candidates);
        let mut opportunities = Vec::new();
        let mut created = Vec::new();

        for mention in mentions {
            let canonical = match self.dossiers.canonical_name(&mention.display).await {
                Ok(name) => name,
                Err(e) => {
                    warn!(name = %mention.display, error = %e, "Canonicalization failed, using mentioned form");
                    mention.display.clone()
                }
            };

            if normalized_name(&canonical) != normalized_name(&mention.display) {
                if let Err(e) = self
                    .store
                    .add_watchlist_alias(&canonical, &mention.display)
                    .await
                {
                    warn!(name = %canonical, error = %e, "Failed to record name alias");
                }
            }

            let intelligence = render_intelligence(&mention, events);

            let mut opportunity = match self.store.opportunity_by_name(&canonical).await? {
                Some(existing) => {
                    let updated = self
                        .update_dossier(existing, &mention, &intelligence)
                        .await;
                    ctx.funnel.opportunities_updated += 1;
                    updated
                }
                None => {
                    let draft = match self.dossiers.compose(&canonical, &intelligence).await {
                        Ok(draft) => draft,
                        Err(e) => {
                            ctx.errors
                                .push(format!("dossier composition failed for {canonical}: {e}"));
                            continue;
                        }
                    };
                    let mut opportunity = Opportunity::new(&canonical, draft.biography);
                    opportunity.reasons_to_contact = draft.reasons_to_contact;
                    for reason in &mention.reasons {
                        if !opportunity.reasons_to_contact.contains(reason) {
                            opportunity.reasons_to_contact.push(reason.clone());
                        }
                    }
                    opportunity.wealth_estimate_musd =
                        draft.wealth_estimate_musd.max(mention.wealth);
                    opportunity.event_keys = mention.event_keys.clone();
                    ctx.funnel.opportunities_created += 1;
                    created.push(canonical.clone());
                    opportunity
                }
            };

            if opportunity.contact_email.is_none() {
                opportunity.contact_email = self.find_contact(&canonical).await;
            }

            match self.embedder.embed(&opportunity.embedding_text()).await {
                Ok(vector) => opportunity.embedding = vector,
                Err(e) => warn!(name = %canonical, error = %e, "Dossier embedding failed"),
            }

            for event in events.iter_mut() {
                if mention.event_keys.contains(&event.event_key)
                    && !event.opportunity_names.contains(&opportunity.name)
                {
                    event.opportunity_names.push(opportunity.name.clone());
                }
            }

            opportunities.push(opportunity);
        }

        info!(
            created = created.len(),
            updated = ctx.funnel.opportunities_updated,
            "Opportunity resolution complete"
        );
        Ok(ResolverOutput {
            opportunities,
            created,
        })
    }

    /// Merge a run's mentions into an existing dossier: monotone wealth,
    /// set-union reasons and event keys, rewritten biography.
    async fn update_dossier(
        &self,
        mut opportunity: Opportunity,
        mention: &Mention,
        intelligence: &str,
    ) -> Opportunity {
        for reason in &mention.reasons {
            if !opportunity.reasons_to_contact.contains(reason) {
                opportunity.reasons_to_contact.push(reason.clone());
            }
        }
        for key in &mention.event_keys {
            if !opportunity.event_keys.contains(key) {
                opportunity.event_keys.push(key.clone());
            }
        }
        opportunity.wealth_estimate_musd = opportunity.wealth_estimate_musd.max(mention.wealth);

        match self
            .dossiers
            .rewrite_biography(&opportunity.biography, intelligence)
            .await
        {
            Ok(biography) => opportunity.biography = biography,
            Err(e) => {
                warn!(name = %opportunity.name, error = %e, "Biography rewrite failed, appending note");
                opportunity.biography = format!(
                    "{}\n\n[{} update] {}",
                    opportunity.biography,
                    Utc::now().format("%Y-%m-%d"),
                    mention.reasons.first().cloned().unwrap_or_default()
                );
            }
        }
        opportunity.last_updated = Utc::now();
        opportunity
    }

    /// Best-effort contact lookup from two targeted searches.
    async fn find_contact(&self, name: &str) -> Option<String> {
        let queries = [
            format!("{name} email contact"),
            format!("{name} family office contact"),
        ];
        let mut snippets = Vec::new();
        for query in &queries {
            match self.fetcher.search(query).await {
                Ok(results) => snippets.extend(
                    results
                        .into_iter()
                        .map(|r| format!("{} ({}): {}", r.title, r.url, r.snippet)),
                ),
                Err(e) => warn!(name, error = %e, "Contact search failed"),
            }
        }
        if snippets.is_empty() {
            return None;
        }
        match self.dossiers.extract_contact(name, &snippets.join("\n")).await {
            Ok(email) => email,
            Err(e) => {
                warn!(name, error = %e, "Contact extraction failed");
                None
            }
        }
    }
}

/// Gather mentions from generated candidates and from events' key
/// individuals, deduped by normalized name. The first mention fixes the
/// display form sent for canonicalization.
fn collect_mentions(
    events: &[Event],
    candidates: Vec<(String, CandidateOpportunity)>,
) -> Vec<Mention> {
    let mut order: Vec<String> = Vec::new();
    let mut by_key: HashMap<String, Mention> = HashMap::new();

    let mut add = |display: &str, reason: String, event_key: &str, wealth: f64| {
        let key = normalized_name(display);
        if key.is_empty() {
            return;
        }
        let mention = by_key.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            Mention::new(display)
        });
        mention.add(reason, event_key, wealth);
    };

    for (event_key, candidate) in candidates {
        add(
            &candidate.name,
            candidate.reason,
            &event_key,
            candidate.wealth_estimate_musd,
        );
    }
    for event in events {
        for individual in &event.key_individuals {
            add(
                &individual.name,
                format!("Named as {} in: {}", individual.role, event.headline),
                &event.event_key,
                0.0,
            );
        }
    }

    order
        .into_iter()
        .filter_map(|key| by_key.remove(&key))
        .collect()
}

/// Event headlines and summaries relevant to one mention, rendered as
/// dossier input.
fn render_intelligence(mention: &Mention, events: &[Event]) -> String {
    let mut out = String::new();
    for key in &mention.event_keys {
        if let Some(event) = events.iter().find(|e| &e.event_key == key) {
            out.push_str(&format!("## {}\n{}\n\n", event.headline, event.summary));
        }
    }
    if !mention.reasons.is_empty() {
        out.push_str("## Why they surfaced\n");
        for reason in &mention.reasons {
            out.push_str(&format!("- {reason}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use windfall_common::types::KeyIndividual;

    fn event(key: &str, headline: &str, individuals: Vec<KeyIndividual>) -> Event {
        Event {
            event_key: key.to_string(),
            headline: headline.to_string(),
            summary: "summary".to_string(),
            country: "CH".to_string(),
            classification: "acquisition".to_string(),
            source_links: vec![],
            highest_relevance_score: 80,
            key_individuals: individuals,
            opportunity_names: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn mentions_dedupe_by_normalized_name() {
        let events = vec![event(
            "k1",
            "Voss sells firm",
            vec![KeyIndividual {
                name: "MARTA   VOSS".to_string(),
                role: "seller".to_string(),
                relationship: None,
            }],
        )];
        let candidates = vec![(
            "k1".to_string(),
            CandidateOpportunity {
                name: "Marta Voss".to_string(),
                reason: "Sold her firm".to_string(),
                wealth_estimate_musd: 120.0,
            },
        )];

        let mentions = collect_mentions(&events, candidates);
        assert_eq!(mentions.len(), 1);
        let m = &mentions[0];
        assert_eq!(m.display, "Marta Voss");
        assert_eq!(m.event_keys, vec!["k1".to_string()]);
        assert_eq!(m.reasons.len(), 2);
        assert_eq!(m.wealth, 120.0);
    }

    #[test]
    fn mention_wealth_is_monotone_max() {
        let candidates = vec![
            (
                "k1".to_string(),
                CandidateOpportunity {
                    name: "A B".to_string(),
                    reason: "r1".to_string(),
                    wealth_estimate_musd: 200.0,
                },
            ),
            (
                "k2".to_string(),
                CandidateOpportunity {
                    name: "A B".to_string(),
                    reason: "r2".to_string(),
                    wealth_estimate_musd: 150.0,
                },
            ),
        ];
        let mentions = collect_mentions(&[], candidates);
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].wealth, 200.0);
        assert_eq!(mentions[0].event_keys.len(), 2);
    }
}
