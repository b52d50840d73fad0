//! Deterministic in-memory doubles for every pipeline collaborator. The
//! whole pipeline runs against these with no network and no database, which
//! is how the integration tests exercise full runs.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use windfall_common::config::RunSettings;
use windfall_common::merge::{self, ARTICLE_MERGE, EVENT_MERGE, OPPORTUNITY_MERGE};
use windfall_common::types::{
    Article, ArticleStatus, Event, Opportunity, RunAudit, Source, WatchlistEntity,
};
use windfall_store::VectorHit;

use crate::embedder::TextEmbedder;
use crate::llm::{
    CandidateEvent, CandidateOpportunity, ClusterAssignment, ContentAssessment, ContentAssessor,
    DossierDraft, DossierWriter, EventComposer, EventContext, HeadlineClassifier,
    HeadlineForAssessment, HeadlineVerdict, QualityJudge, ReviewItem, ReviewVerdict,
    TriageVerdict,
};
use crate::llm::ArticleDigest;
use crate::traits::{ContentFetcher, FetchedPage, Notifier, PipelineStore, SearchResult};
use crate::traits::VectorIndex;

pub fn article(title: &str, link: &str, source: &str, country: &str) -> Article {
    Article::new(title, link, source, country)
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory PipelineStore applying the same merge tables as the Postgres
/// store, so idempotence tests mean the same thing in both worlds.
#[derive(Default)]
pub struct MemoryStore {
    articles: Mutex<HashMap<String, Value>>,
    events: Mutex<HashMap<String, Value>>,
    opportunities: Mutex<HashMap<String, Value>>,
    watchlist: Mutex<Vec<WatchlistEntity>>,
    sources: Mutex<HashMap<String, Source>>,
    settings: Mutex<RunSettings>,
    audits: Mutex<Vec<RunAudit>>,
    aliases: Mutex<Vec<(String, String)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_settings(&self, settings: RunSettings) {
        *self.settings.lock().unwrap() = settings;
    }

    pub fn seed_article(&self, article: &Article) {
        self.articles.lock().unwrap().insert(
            article.link.clone(),
            serde_json::to_value(article).unwrap(),
        );
    }

    pub fn seed_watchlist(&self, entity: WatchlistEntity) {
        self.watchlist.lock().unwrap().push(entity);
    }

    pub fn seed_opportunity(&self, opportunity: &Opportunity) {
        self.opportunities.lock().unwrap().insert(
            opportunity.name.clone(),
            serde_json::to_value(opportunity).unwrap(),
        );
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap()
            .values()
            .map(|v| serde_json::from_value(v.clone()).unwrap())
            .collect()
    }

    pub fn event(&self, key: &str) -> Option<Event> {
        self.events
            .lock()
            .unwrap()
            .get(key)
            .map(|v| serde_json::from_value(v.clone()).unwrap())
    }

    pub fn opportunities(&self) -> Vec<Opportunity> {
        self.opportunities
            .lock()
            .unwrap()
            .values()
            .map(|v| serde_json::from_value(v.clone()).unwrap())
            .collect()
    }

    pub fn opportunity(&self, name: &str) -> Option<Opportunity> {
        self.opportunities
            .lock()
            .unwrap()
            .get(name)
            .map(|v| serde_json::from_value(v.clone()).unwrap())
    }

    pub fn articles(&self) -> Vec<Article> {
        self.articles
            .lock()
            .unwrap()
            .values()
            .map(|v| serde_json::from_value(v.clone()).unwrap())
            .collect()
    }

    pub fn audits(&self) -> Vec<RunAudit> {
        self.audits.lock().unwrap().clone()
    }

    pub fn recorded_aliases(&self) -> Vec<(String, String)> {
        self.aliases.lock().unwrap().clone()
    }

    pub fn watchlist(&self) -> Vec<WatchlistEntity> {
        self.watchlist.lock().unwrap().clone()
    }

    pub fn source(&self, name: &str) -> Option<Source> {
        self.sources.lock().unwrap().get(name).cloned()
    }
}

#[async_trait]
impl PipelineStore for MemoryStore {
    async fn scraped_articles(
        &self,
        country: Option<&str>,
        sources: Option<&[String]>,
    ) -> Result<Vec<Article>> {
        Ok(self
            .articles()
            .into_iter()
            .filter(|a| a.status == ArticleStatus::Scraped)
            .filter(|a| country.map_or(true, |c| a.country == c))
            .filter(|a| sources.map_or(true, |s| s.contains(&a.source)))
            .collect())
    }

    async fn processed_article_links(&self, links: &[String]) -> Result<HashSet<String>> {
        let articles = self.articles.lock().unwrap();
        Ok(links
            .iter()
            .filter(|l| {
                articles
                    .get(*l)
                    .map_or(false, |doc| doc["status"] != "scraped")
            })
            .cloned()
            .collect())
    }

    async fn article_by_link(&self, link: &str) -> Result<Option<Article>> {
        Ok(self
            .articles
            .lock()
            .unwrap()
            .get(link)
            .map(|v| serde_json::from_value(v.clone()).unwrap()))
    }

    async fn upsert_article(&self, article: &Article) -> Result<()> {
        let incoming = serde_json::to_value(article)?;
        let mut articles = self.articles.lock().unwrap();
        match articles.get_mut(&article.link) {
            Some(existing) => merge::apply(&ARTICLE_MERGE, existing, &incoming),
            None => {
                articles.insert(article.link.clone(), incoming);
            }
        }
        Ok(())
    }

    async fn existing_event_keys(&self, keys: &[String]) -> Result<HashSet<String>> {
        let events = self.events.lock().unwrap();
        Ok(keys
            .iter()
            .filter(|k| events.contains_key(*k))
            .cloned()
            .collect())
    }

    async fn upsert_event(&self, event: &Event) -> Result<()> {
        let incoming = serde_json::to_value(event)?;
        let mut events = self.events.lock().unwrap();
        match events.get_mut(&event.event_key) {
            Some(existing) => merge::apply(&EVENT_MERGE, existing, &incoming),
            None => {
                events.insert(event.event_key.clone(), incoming);
            }
        }
        Ok(())
    }

    async fn opportunity_by_name(&self, name: &str) -> Result<Option<Opportunity>> {
        Ok(self
            .opportunities
            .lock()
            .unwrap()
            .get(name)
            .map(|v| serde_json::from_value(v.clone()).unwrap()))
    }

    async fn upsert_opportunity(&self, opportunity: &Opportunity) -> Result<()> {
        let incoming = serde_json::to_value(opportunity)?;
        let mut opportunities = self.opportunities.lock().unwrap();
        match opportunities.get_mut(&opportunity.name) {
            Some(existing) => merge::apply(&OPPORTUNITY_MERGE, existing, &incoming),
            None => {
                opportunities.insert(opportunity.name.clone(), incoming);
            }
        }
        Ok(())
    }

    async fn watchlist_entities(&self) -> Result<Vec<WatchlistEntity>> {
        Ok(self.watchlist.lock().unwrap().clone())
    }

    async fn upsert_watchlist_entity(&self, entity: &WatchlistEntity) -> Result<()> {
        let mut watchlist = self.watchlist.lock().unwrap();
        match watchlist.iter_mut().find(|e| e.name == entity.name) {
            Some(existing) => *existing = entity.clone(),
            None => watchlist.push(entity.clone()),
        }
        Ok(())
    }

    async fn add_watchlist_alias(&self, entity_name: &str, alias: &str) -> Result<()> {
        self.aliases
            .lock()
            .unwrap()
            .push((entity_name.to_string(), alias.to_string()));
        let mut watchlist = self.watchlist.lock().unwrap();
        if let Some(entity) = watchlist.iter_mut().find(|e| e.name == entity_name) {
            if !entity.terms.iter().any(|t| t == alias) {
                entity.terms.push(alias.to_string());
            }
        }
        Ok(())
    }

    async fn sources_by_names(&self, names: &[String]) -> Result<HashMap<String, Source>> {
        let sources = self.sources.lock().unwrap();
        Ok(names
            .iter()
            .filter_map(|n| sources.get(n).map(|s| (n.clone(), s.clone())))
            .collect())
    }

    async fn upsert_source(&self, source: &Source) -> Result<()> {
        self.sources
            .lock()
            .unwrap()
            .insert(source.name.clone(), source.clone());
        Ok(())
    }

    async fn run_settings(&self) -> Result<RunSettings> {
        Ok(self.settings.lock().unwrap().clone())
    }

    async fn insert_run_audit(&self, audit: &RunAudit) -> Result<()> {
        self.audits.lock().unwrap().push(audit.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Scripted content fetcher. Unscripted page URLs fail, which is also how
/// tests simulate scrape failures.
#[derive(Default)]
pub struct MockFetcher {
    pages: Mutex<HashMap<String, String>>,
    search_results: Mutex<HashMap<String, Vec<SearchResult>>>,
    news_results: Mutex<Vec<SearchResult>>,
    encyclopedia: Mutex<HashMap<String, String>>,
    pub page_fetches: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_page(&self, url: &str, text: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), text.to_string());
    }

    /// Script search results returned for any query containing `needle`.
    pub fn script_search(&self, needle: &str, results: Vec<SearchResult>) {
        self.search_results
            .lock()
            .unwrap()
            .insert(needle.to_string(), results);
    }

    pub fn script_news(&self, results: Vec<SearchResult>) {
        *self.news_results.lock().unwrap() = results;
    }

    pub fn script_encyclopedia(&self, topic: &str, summary: &str) {
        self.encyclopedia
            .lock()
            .unwrap()
            .insert(topic.to_string(), summary.to_string());
    }
}

pub fn search_result(title: &str, url: &str, snippet: &str) -> SearchResult {
    SearchResult {
        title: title.to_string(),
        url: url.to_string(),
        snippet: snippet.to_string(),
    }
}

#[async_trait]
impl ContentFetcher for MockFetcher {
    async fn page(&self, url: &str) -> Result<FetchedPage> {
        self.page_fetches.fetch_add(1, Ordering::SeqCst);
        match self.pages.lock().unwrap().get(url) {
            Some(text) => Ok(FetchedPage {
                url: url.to_string(),
                text: text.clone(),
            }),
            None => bail!("no page scripted for {url}"),
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let results = self.search_results.lock().unwrap();
        Ok(results
            .iter()
            .find(|(needle, _)| query.contains(needle.as_str()))
            .map(|(_, r)| r.clone())
            .unwrap_or_default())
    }

    async fn news(&self, _query: &str) -> Result<Vec<SearchResult>> {
        Ok(self.news_results.lock().unwrap().clone())
    }

    async fn encyclopedia(&self, topic: &str) -> Result<Option<String>> {
        Ok(self.encyclopedia.lock().unwrap().get(topic).cloned())
    }
}

// ---------------------------------------------------------------------------
// Embeddings and vectors
// ---------------------------------------------------------------------------

/// Deterministic embedder: a small vector derived from byte content, so
/// identical texts are identical vectors and similarity is reproducible.
pub struct FixedEmbedder;

#[async_trait]
impl TextEmbedder for FixedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; 8];
        for (i, byte) in text.bytes().enumerate() {
            vector[i % 8] += f32::from(byte) / 255.0;
        }
        Ok(vector)
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in &texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

#[derive(Default)]
pub struct MemoryVectorIndex {
    entries: Mutex<Vec<(String, String, Vec<f32>, Value)>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(id, ..)| id.clone())
            .collect()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        dot += f64::from(*x) * f64::from(*y);
        na += f64::from(*x) * f64::from(*x);
        nb += f64::from(*y) * f64::from(*y);
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn upsert(&self, id: &str, kind: &str, vector: &[f32], metadata: &Value) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|(existing, ..)| existing != id);
        entries.push((
            id.to_string(),
            kind.to_string(),
            vector.to_vec(),
            metadata.clone(),
        ));
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        kind: Option<&str>,
    ) -> Result<Vec<VectorHit>> {
        let entries = self.entries.lock().unwrap();
        let mut hits: Vec<VectorHit> = entries
            .iter()
            .filter(|(_, k, ..)| kind.map_or(true, |want| k == want))
            .map(|(id, _, v, metadata)| VectorHit {
                id: id.clone(),
                similarity: cosine(vector, v),
                metadata: metadata.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(top_k);
        Ok(hits)
    }
}

// ---------------------------------------------------------------------------
// LLM mocks
// ---------------------------------------------------------------------------

/// Headline classifier scripted by title. `fail_batch_calls` makes the
/// first N batch calls error, to exercise retry and per-item fallback.
#[derive(Default)]
pub struct MockHeadlineClassifier {
    scores: Mutex<HashMap<String, i64>>,
    fail_batch_calls: AtomicUsize,
    fail_single_titles: Mutex<HashSet<String>>,
    pub batch_calls: AtomicUsize,
    pub single_calls: AtomicUsize,
}

impl MockHeadlineClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_score(&self, title: &str, score: i64) {
        self.scores.lock().unwrap().insert(title.to_string(), score);
    }

    pub fn fail_next_batches(&self, n: usize) {
        self.fail_batch_calls.store(n, Ordering::SeqCst);
    }

    pub fn fail_single_for(&self, title: &str) {
        self.fail_single_titles
            .lock()
            .unwrap()
            .insert(title.to_string());
    }

    fn verdict(&self, title: &str) -> HeadlineVerdict {
        let score = self
            .scores
            .lock()
            .unwrap()
            .get(title)
            .copied()
            .unwrap_or(0);
        HeadlineVerdict {
            score,
            rationale: format!("scripted score {score}"),
        }
    }
}

#[async_trait]
impl HeadlineClassifier for MockHeadlineClassifier {
    async fn assess_batch(&self, batch: &[HeadlineForAssessment]) -> Result<Vec<HeadlineVerdict>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.fail_batch_calls.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_batch_calls.store(remaining - 1, Ordering::SeqCst);
            bail!("scripted batch failure");
        }
        Ok(batch.iter().map(|item| self.verdict(&item.title)).collect())
    }

    async fn assess_single(&self, item: &HeadlineForAssessment) -> Result<HeadlineVerdict> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_single_titles.lock().unwrap().contains(&item.title) {
            bail!("scripted single failure");
        }
        Ok(self.verdict(&item.title))
    }
}

/// Content assessor scripted by substring match against the content body,
/// so salvage tests can give different verdicts per alternative source.
#[derive(Default)]
pub struct MockAssessor {
    out_of_scope: Mutex<HashSet<String>>,
    assessments: Mutex<Vec<(String, ContentAssessment)>>,
}

impl MockAssessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_out_of_scope(&self, title: &str) {
        self.out_of_scope.lock().unwrap().insert(title.to_string());
    }

    /// Script the assessment returned when the content contains `needle`.
    pub fn script_assessment(&self, needle: &str, assessment: ContentAssessment) {
        self.assessments
            .lock()
            .unwrap()
            .push((needle.to_string(), assessment));
    }
}

pub fn assessment(score: i64, summary: &str) -> ContentAssessment {
    ContentAssessment {
        score,
        summary: summary.to_string(),
        key_individuals: Vec::new(),
    }
}

#[async_trait]
impl ContentAssessor for MockAssessor {
    async fn triage(&self, title: &str, _content: &str) -> Result<TriageVerdict> {
        let out = self.out_of_scope.lock().unwrap().contains(title);
        Ok(TriageVerdict {
            in_scope: !out,
            reason: if out {
                "scripted out of scope".to_string()
            } else {
                "scripted in scope".to_string()
            },
        })
    }

    async fn assess(&self, _title: &str, content: &str) -> Result<ContentAssessment> {
        self.assessments
            .lock()
            .unwrap()
            .iter()
            .find(|(needle, _)| content.contains(needle.as_str()))
            .map(|(_, a)| a.clone())
            .ok_or_else(|| anyhow!("no assessment scripted for content"))
    }
}

/// Composer with scripted clusters, per-cluster events, and per-event
/// opportunities. Unscripted clusters synthesize a single event from the
/// highest-scored article digest.
#[derive(Default)]
pub struct MockComposer {
    clusters: Mutex<Vec<ClusterAssignment>>,
    fail_cluster_calls: AtomicUsize,
    events: Mutex<HashMap<String, Vec<CandidateEvent>>>,
    opportunities: Mutex<HashMap<String, Vec<CandidateOpportunity>>>,
    entities: Mutex<Vec<String>>,
    pub cluster_calls: AtomicUsize,
}

impl MockComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_cluster(&self, cluster_key: &str, article_links: Vec<String>) {
        self.clusters.lock().unwrap().push(ClusterAssignment {
            cluster_key: cluster_key.to_string(),
            article_links,
        });
    }

    pub fn fail_next_cluster_calls(&self, n: usize) {
        self.fail_cluster_calls.store(n, Ordering::SeqCst);
    }

    pub fn script_events(&self, cluster_key: &str, events: Vec<CandidateEvent>) {
        self.events
            .lock()
            .unwrap()
            .insert(cluster_key.to_string(), events);
    }

    pub fn script_opportunities(
        &self,
        event_headline: &str,
        opportunities: Vec<CandidateOpportunity>,
    ) {
        self.opportunities
            .lock()
            .unwrap()
            .insert(event_headline.to_string(), opportunities);
    }

    pub fn script_entities(&self, entities: Vec<String>) {
        *self.entities.lock().unwrap() = entities;
    }
}

pub fn candidate_event(headline: &str, summary: &str, classification: &str) -> CandidateEvent {
    CandidateEvent {
        headline: headline.to_string(),
        summary: summary.to_string(),
        classification: classification.to_string(),
        key_individuals: Vec::new(),
    }
}

pub fn candidate_opportunity(name: &str, reason: &str, wealth: f64) -> CandidateOpportunity {
    CandidateOpportunity {
        name: name.to_string(),
        reason: reason.to_string(),
        wealth_estimate_musd: wealth,
    }
}

#[async_trait]
impl EventComposer for MockComposer {
    async fn cluster(&self, _articles: &[ArticleDigest]) -> Result<Vec<ClusterAssignment>> {
        self.cluster_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.fail_cluster_calls.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_cluster_calls
                .store(remaining - 1, Ordering::SeqCst);
            bail!("scripted cluster failure");
        }
        Ok(self.clusters.lock().unwrap().clone())
    }

    async fn extract_entities(&self, _text: &str) -> Result<Vec<String>> {
        Ok(self.entities.lock().unwrap().clone())
    }

    async fn synthesize(&self, context: &EventContext) -> Result<Vec<CandidateEvent>> {
        if let Some(events) = self.events.lock().unwrap().get(&context.cluster_key) {
            return Ok(events.clone());
        }
        let primary = context
            .articles
            .iter()
            .max_by_key(|a| a.score)
            .ok_or_else(|| anyhow!("empty cluster"))?;
        Ok(vec![candidate_event(
            &primary.title,
            &primary.summary,
            "other",
        )])
    }

    async fn generate_opportunities(
        &self,
        event_headline: &str,
        _event_summary: &str,
        _context: &EventContext,
    ) -> Result<Vec<CandidateOpportunity>> {
        Ok(self
            .opportunities
            .lock()
            .unwrap()
            .get(event_headline)
            .cloned()
            .unwrap_or_default())
    }
}

/// Dossier writer with identity canonicalization unless an alias mapping is
/// scripted. Biographies are deterministic text.
#[derive(Default)]
pub struct MockDossierWriter {
    canonical: Mutex<HashMap<String, String>>,
    wealth: Mutex<HashMap<String, f64>>,
    contacts: Mutex<HashMap<String, String>>,
    fail_compose: Mutex<HashSet<String>>,
}

impl MockDossierWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_canonical(&self, mentioned: &str, canonical: &str) {
        self.canonical
            .lock()
            .unwrap()
            .insert(mentioned.to_string(), canonical.to_string());
    }

    pub fn script_wealth(&self, name: &str, wealth: f64) {
        self.wealth.lock().unwrap().insert(name.to_string(), wealth);
    }

    pub fn script_contact(&self, name: &str, email: &str) {
        self.contacts
            .lock()
            .unwrap()
            .insert(name.to_string(), email.to_string());
    }

    pub fn fail_compose_for(&self, name: &str) {
        self.fail_compose.lock().unwrap().insert(name.to_string());
    }
}

#[async_trait]
impl DossierWriter for MockDossierWriter {
    async fn compose(&self, name: &str, _intelligence: &str) -> Result<DossierDraft> {
        if self.fail_compose.lock().unwrap().contains(name) {
            bail!("scripted compose failure");
        }
        Ok(DossierDraft {
            biography: format!("Dossier for {name}."),
            reasons_to_contact: Vec::new(),
            wealth_estimate_musd: self
                .wealth
                .lock()
                .unwrap()
                .get(name)
                .copied()
                .unwrap_or(0.0),
        })
    }

    async fn rewrite_biography(&self, existing: &str, _intelligence: &str) -> Result<String> {
        Ok(format!("{existing} Updated with new intelligence."))
    }

    async fn canonical_name(&self, name: &str) -> Result<String> {
        Ok(self
            .canonical
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string()))
    }

    async fn extract_contact(&self, name: &str, _search_results: &str) -> Result<Option<String>> {
        Ok(self.contacts.lock().unwrap().get(name).cloned())
    }
}

/// Judge scripted with explicit verdicts; `fail()` makes review error so
/// tests can assert the fail-open path.
#[derive(Default)]
pub struct MockJudge {
    verdicts: Mutex<Vec<ReviewVerdict>>,
    fail: Mutex<bool>,
    pub reviewed: Mutex<Vec<String>>,
}

impl MockJudge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_verdict(&self, verdict: ReviewVerdict) {
        self.verdicts.lock().unwrap().push(verdict);
    }

    pub fn fail(&self) {
        *self.fail.lock().unwrap() = true;
    }
}

#[async_trait]
impl QualityJudge for MockJudge {
    async fn review(&self, items: &[ReviewItem]) -> Result<Vec<ReviewVerdict>> {
        self.reviewed
            .lock()
            .unwrap()
            .extend(items.iter().map(|i| i.id.clone()));
        if *self.fail.lock().unwrap() {
            bail!("scripted judge failure");
        }
        Ok(self.verdicts.lock().unwrap().clone())
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    pub notifications: Mutex<Vec<(Vec<Event>, Vec<Opportunity>)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.notifications.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, events: &[Event], opportunities: &[Opportunity]) -> Result<()> {
        self.notifications
            .lock()
            .unwrap()
            .push((events.to_vec(), opportunities.to_vec()));
        Ok(())
    }
}
