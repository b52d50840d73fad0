//! Final quality gate over the run's candidate events and dossiers. The
//! judge fails OPEN: if the review call errors, everything is kept and the
//! verdict records that no filtering happened.

use std::collections::HashSet;

use tracing::{info, warn};

use windfall_common::types::{Event, Opportunity};

use crate::llm::ReviewItem;

use super::state::RunContext;
use super::Pipeline;

impl Pipeline {
    pub(crate) async fn judge_candidates(
        &self,
        events: Vec<Event>,
        opportunities: Vec<Opportunity>,
        ctx: &mut RunContext,
    ) -> (Vec<Event>, Vec<Opportunity>) {
        if events.is_empty() && opportunities.is_empty() {
            ctx.judge_verdict = "nothing to review".to_string();
            return (events, opportunities);
        }

        let mut items = Vec::with_capacity(events.len() + opportunities.len());
        for event in &events {
            items.push(ReviewItem {
                id: format!("event_{}", event.event_key),
                text: format!("{}\n{}", event.headline, event.summary),
                score: event.highest_relevance_score,
                rationale: event.classification.clone(),
            });
        }
        for opportunity in &opportunities {
            items.push(ReviewItem {
                id: format!("opportunity_{}", opportunity.name),
                text: opportunity.biography.clone(),
                score: opportunity.wealth_estimate_musd.min(100.0) as u8,
                rationale: opportunity.reasons_to_contact.join("; "),
            });
        }

        let verdicts = match self.judge.review(&items).await {
            Ok(verdicts) => verdicts,
            Err(e) => {
                warn!(error = %e, "Quality review failed, keeping all candidates");
                ctx.judge_verdict = format!(
                    "review failed ({e}); fail-open, all {} candidates kept",
                    items.len()
                );
                return (events, opportunities);
            }
        };

        // Only explicit failing verdicts remove items; an item the judge did
        // not mention is kept.
        let rejected: HashSet<String> = verdicts
            .iter()
            .filter(|v| !v.label.passes())
            .map(|v| v.id.clone())
            .collect();

        ctx.funnel.judge_rejected = rejected.len() as u32;
        ctx.judge_verdict = format!("{} reviewed, {} rejected", items.len(), rejected.len());

        let mut events: Vec<Event> = events
            .into_iter()
            .filter(|e| !rejected.contains(&format!("event_{}", e.event_key)))
            .collect();
        let mut opportunities: Vec<Opportunity> = opportunities
            .into_iter()
            .filter(|o| !rejected.contains(&format!("opportunity_{}", o.name)))
            .collect();

        // Survivors must not carry links to rejected items: union merges at
        // commit would otherwise persist the stale reference for good.
        let rejected_events: HashSet<&str> = rejected
            .iter()
            .filter_map(|id| id.strip_prefix("event_"))
            .collect();
        let rejected_opportunities: HashSet<&str> = rejected
            .iter()
            .filter_map(|id| id.strip_prefix("opportunity_"))
            .collect();
        for event in &mut events {
            event
                .opportunity_names
                .retain(|n| !rejected_opportunities.contains(n.as_str()));
        }
        for opportunity in &mut opportunities {
            opportunity
                .event_keys
                .retain(|k| !rejected_events.contains(k.as_str()));
        }

        info!(
            kept_events = events.len(),
            kept_opportunities = opportunities.len(),
            rejected = ctx.funnel.judge_rejected,
            "Quality review complete"
        );
        (events, opportunities)
    }
}
