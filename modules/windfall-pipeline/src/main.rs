use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::EnvFilter;

use windfall_common::config::Config;
use windfall_pipeline::embedder::Embedder;
use windfall_pipeline::llm::{
    ClaudeContentAssessor, ClaudeDossierWriter, ClaudeEventComposer, ClaudeHeadlineClassifier,
    ClaudeQualityJudge,
};
use windfall_pipeline::pipeline::{Pipeline, PipelineDeps, RunOptions};
use windfall_pipeline::scraper::{LogNotifier, WebFetcher, WebhookNotifier};
use windfall_pipeline::traits::Notifier;
use windfall_store::{DocStore, PgVectorIndex};

#[derive(Parser)]
#[command(name = "windfall", about = "Liquidity-event prospecting pipeline")]
struct Args {
    /// Restrict the run to one country code (e.g. CH).
    #[arg(long)]
    country: Option<String>,

    /// Restrict the run to named sources; repeatable.
    #[arg(long = "source")]
    sources: Vec<String>,

    /// Re-process headlines whose links are already stored.
    #[arg(long)]
    refresh: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("windfall=info".parse()?))
        .init();

    let args = Args::parse();

    info!("Windfall pipeline starting...");
    let config = Config::from_env();
    config.log_redacted();

    let pool = PgPool::connect(&config.database_url).await?;
    let store = DocStore::new(pool.clone());
    store.migrate().await?;
    let vectors = PgVectorIndex::new(pool);
    vectors.migrate().await?;

    // Model routing comes from the stored settings, snapshotted again by
    // the pipeline itself at run start.
    let settings = store.run_settings().await?;

    let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url, config.notify_recipients.clone())),
        None => Arc::new(LogNotifier),
    };

    let deps = PipelineDeps {
        store: Arc::new(store),
        vectors: Arc::new(vectors),
        fetcher: Arc::new(WebFetcher::new(
            &config.scrape_api_key,
            &config.search_api_key,
        )),
        embedder: Arc::new(Embedder::new(
            &config.voyage_api_key,
            &settings.embedding_model,
        )),
        headlines: Arc::new(ClaudeHeadlineClassifier::new(
            &config.anthropic_api_key,
            &settings.triage_model,
        )),
        assessor: Arc::new(ClaudeContentAssessor::new(
            &config.anthropic_api_key,
            &settings.triage_model,
            &settings.assessment_model,
        )),
        composer: Arc::new(ClaudeEventComposer::new(
            &config.anthropic_api_key,
            &settings.synthesis_model,
        )),
        dossiers: Arc::new(ClaudeDossierWriter::new(
            &config.anthropic_api_key,
            &settings.assessment_model,
        )),
        judge: Arc::new(ClaudeQualityJudge::new(
            &config.anthropic_api_key,
            &settings.judge_model,
        )),
        notifier,
    };

    let pipeline = Pipeline::new(deps);
    let options = RunOptions {
        country: args.country,
        sources: (!args.sources.is_empty()).then_some(args.sources),
        refresh: args.refresh,
        injected_articles: None,
    };

    let report = pipeline.run(options).await?;
    info!(
        run_id = %report.audit.run_id,
        success = report.success,
        cost_cents = report.audit.estimated_cost_cents,
        "Run finished"
    );

    if !report.success {
        std::process::exit(1);
    }
    Ok(())
}
