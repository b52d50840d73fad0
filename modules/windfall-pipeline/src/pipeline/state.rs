use chrono::{DateTime, Utc};
use uuid::Uuid;

use windfall_common::config::RunSettings;
use windfall_common::types::{Article, FunnelStats, RunAudit};

/// Options accepted by the pipeline entry point.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub country: Option<String>,
    pub sources: Option<Vec<String>>,
    /// Refresh mode: re-process headlines whose links are already persisted,
    /// rehydrating their document ids so downstream stages update in place.
    pub refresh: bool,
    /// Injected articles bypass the store read (reprocessing/testing).
    pub injected_articles: Option<Vec<Article>>,
}

/// Per-run mutable context threaded through the stages. Holds the immutable
/// settings snapshot plus diagnostics; stages never share state except
/// through their explicit inputs/outputs and these counters.
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub settings: RunSettings,
    pub funnel: FunnelStats,
    pub errors: Vec<String>,
    pub judge_verdict: String,
    pub committed_event_keys: Vec<String>,
    pub opportunity_names: Vec<String>,
}

impl RunContext {
    pub fn new(settings: RunSettings) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            settings,
            funnel: FunnelStats::default(),
            errors: Vec::new(),
            judge_verdict: String::new(),
            committed_event_keys: Vec::new(),
            opportunity_names: Vec::new(),
        }
    }

    /// Coarse run cost estimate from funnel counters, using per-call
    /// averages (cents): batch triage ~1/headline, enrichment ~2/article,
    /// synthesis ~4/event, dossier work ~3/opportunity.
    pub fn estimated_cost_cents(&self) -> u64 {
        let f = &self.funnel;
        u64::from(f.headlines_assessed)
            + 2 * u64::from(f.articles_enriched + f.articles_dropped)
            + 4 * u64::from(f.events_synthesized)
            + 3 * u64::from(f.opportunities_created + f.opportunities_updated)
    }

    pub fn into_audit(self, failing_sources: Vec<String>) -> RunAudit {
        RunAudit {
            estimated_cost_cents: self.estimated_cost_cents(),
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            funnel: self.funnel,
            judge_verdict: self.judge_verdict,
            event_keys: self.committed_event_keys,
            opportunity_names: self.opportunity_names,
            errors: self.errors,
            failing_sources,
        }
    }
}

/// What the entry point returns: a success flag plus the full audit object.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub success: bool,
    pub audit: RunAudit,
}
