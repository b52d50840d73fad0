//! The pipeline engine: eight stages run strictly in sequence within one
//! run. Each stage is a function from explicit inputs to explicit outputs
//! plus funnel diagnostics; the orchestrator threads results forward, so
//! there is no hidden cross-stage mutation. Bounded parallelism exists only
//! inside content enrichment and per-cluster synthesis.

mod commit;
mod context;
mod enrichment;
mod filter;
mod judge;
mod resolver;
pub mod state;
mod synthesis;
mod triage;

pub use state::{RunOptions, RunReport};

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use windfall_common::merge;

use crate::embedder::TextEmbedder;
use crate::llm::{ContentAssessor, DossierWriter, EventComposer, HeadlineClassifier, QualityJudge};
use crate::traits::{ContentFetcher, Notifier, PipelineStore, VectorIndex};

use state::RunContext;

/// Collaborators wired in at startup. Everything is behind a trait so the
/// whole pipeline runs deterministically against the `testing` mocks.
pub struct PipelineDeps {
    pub store: Arc<dyn PipelineStore>,
    pub vectors: Arc<dyn VectorIndex>,
    pub fetcher: Arc<dyn ContentFetcher>,
    pub embedder: Arc<dyn TextEmbedder>,
    pub headlines: Arc<dyn HeadlineClassifier>,
    pub assessor: Arc<dyn ContentAssessor>,
    pub composer: Arc<dyn EventComposer>,
    pub dossiers: Arc<dyn DossierWriter>,
    pub judge: Arc<dyn QualityJudge>,
    pub notifier: Arc<dyn Notifier>,
}

pub struct Pipeline {
    pub(crate) store: Arc<dyn PipelineStore>,
    pub(crate) vectors: Arc<dyn VectorIndex>,
    pub(crate) fetcher: Arc<dyn ContentFetcher>,
    pub(crate) embedder: Arc<dyn TextEmbedder>,
    pub(crate) headlines: Arc<dyn HeadlineClassifier>,
    pub(crate) assessor: Arc<dyn ContentAssessor>,
    pub(crate) composer: Arc<dyn EventComposer>,
    pub(crate) dossiers: Arc<dyn DossierWriter>,
    pub(crate) judge: Arc<dyn QualityJudge>,
    pub(crate) notifier: Arc<dyn Notifier>,
}

impl Pipeline {
    pub fn new(deps: PipelineDeps) -> Self {
        Self {
            store: deps.store,
            vectors: deps.vectors,
            fetcher: deps.fetcher,
            embedder: deps.embedder,
            headlines: deps.headlines,
            assessor: deps.assessor,
            composer: deps.composer,
            dossiers: deps.dossiers,
            judge: deps.judge,
            notifier: deps.notifier,
        }
    }

    /// The single entry point: run the full pipeline once.
    ///
    /// A stage failure aborts the remaining stages but is not an `Err` here:
    /// the report carries `success = false` and the audit records the error.
    /// Commits already made stay valid; nothing is rolled back.
    pub async fn run(&self, options: RunOptions) -> Result<RunReport> {
        merge::validate()?;

        // Snapshot runtime settings once; stages see an immutable value.
        let settings = self.store.run_settings().await?;
        let mut ctx = RunContext::new(settings);

        info!(run_id = %ctx.run_id, refresh = options.refresh, "Pipeline run starting");

        let mut failing_sources = Vec::new();
        let success = match self.run_stages(&options, &mut ctx).await {
            Ok(flagged) => {
                failing_sources = flagged;
                true
            }
            Err(e) => {
                error!(run_id = %ctx.run_id, error = %e, "Pipeline run aborted");
                ctx.errors.push(e.to_string());
                false
            }
        };

        info!("{}", ctx.funnel);

        let audit = ctx.into_audit(failing_sources);
        if let Err(e) = self.store.insert_run_audit(&audit).await {
            error!(run_id = %audit.run_id, error = %e, "Failed to persist run audit");
        }

        Ok(RunReport { success, audit })
    }

    /// Strict stage sequence. Returns the flagged failing-source list.
    async fn run_stages(&self, options: &RunOptions, ctx: &mut RunContext) -> Result<Vec<String>> {
        // Intake: injected articles or the store's scraped backlog.
        let scraped = match &options.injected_articles {
            Some(articles) => articles.clone(),
            None => {
                self.store
                    .scraped_articles(options.country.as_deref(), options.sources.as_deref())
                    .await?
            }
        };
        ctx.funnel.headlines_scraped = scraped.len() as u32;

        let fresh = self.filter_fresh(scraped, options.refresh, ctx).await?;
        let triaged = self.triage_headlines(fresh, ctx).await?;
        let mut processed = triaged.dropped;

        let enriched = self.enrich_articles(triaged.relevant, ctx).await;
        processed.extend(enriched.dropped);

        let synthesis = self.synthesize_events(&enriched.enriched, ctx).await?;
        let mut events = synthesis.events;

        let resolved = self
            .resolve_opportunities(&mut events, synthesis.candidates, ctx)
            .await?;

        let (events, opportunities) = self
            .judge_candidates(events, resolved.opportunities, ctx)
            .await;

        let mut articles = enriched.enriched;
        articles.extend(processed);

        let flagged = self
            .commit_run(events, opportunities, articles, &resolved.created, ctx)
            .await?;

        Ok(flagged)
    }
}
