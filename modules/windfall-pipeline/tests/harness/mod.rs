//! Shared wiring for full-pipeline tests: a Pipeline built entirely from the
//! in-memory doubles in `windfall_pipeline::testing`. No network, no
//! database.

#![allow(dead_code)]

use std::sync::Arc;

use windfall_pipeline::pipeline::{Pipeline, PipelineDeps, RunOptions, RunReport};
use windfall_pipeline::testing::{
    FixedEmbedder, MemoryStore, MemoryVectorIndex, MockAssessor, MockComposer,
    MockDossierWriter, MockFetcher, MockHeadlineClassifier, MockJudge, RecordingNotifier,
};

pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub vectors: Arc<MemoryVectorIndex>,
    pub fetcher: Arc<MockFetcher>,
    pub headlines: Arc<MockHeadlineClassifier>,
    pub assessor: Arc<MockAssessor>,
    pub composer: Arc<MockComposer>,
    pub dossiers: Arc<MockDossierWriter>,
    pub judge: Arc<MockJudge>,
    pub notifier: Arc<RecordingNotifier>,
    pipeline: Pipeline,
}

impl TestContext {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let vectors = Arc::new(MemoryVectorIndex::new());
        let fetcher = Arc::new(MockFetcher::new());
        let headlines = Arc::new(MockHeadlineClassifier::new());
        let assessor = Arc::new(MockAssessor::new());
        let composer = Arc::new(MockComposer::new());
        let dossiers = Arc::new(MockDossierWriter::new());
        let judge = Arc::new(MockJudge::new());
        let notifier = Arc::new(RecordingNotifier::new());

        let pipeline = Pipeline::new(PipelineDeps {
            store: store.clone(),
            vectors: vectors.clone(),
            fetcher: fetcher.clone(),
            embedder: Arc::new(FixedEmbedder),
            headlines: headlines.clone(),
            assessor: assessor.clone(),
            composer: composer.clone(),
            dossiers: dossiers.clone(),
            judge: judge.clone(),
            notifier: notifier.clone(),
        });

        Self {
            store,
            vectors,
            fetcher,
            headlines,
            assessor,
            composer,
            dossiers,
            judge,
            notifier,
            pipeline,
        }
    }

    pub async fn run(&self, options: RunOptions) -> RunReport {
        self.pipeline.run(options).await.expect("pipeline run")
    }

    pub async fn run_default(&self) -> RunReport {
        self.run(RunOptions::default()).await
    }
}
