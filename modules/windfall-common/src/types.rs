use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

/// Clamp a raw model-reported score into the valid [0,100] range.
pub fn clamp_score(raw: i64) -> u8 {
    raw.clamp(0, 100) as u8
}

/// Lowercased, whitespace-collapsed form of a display name, used as the
/// dedup key for individuals before canonicalization.
pub fn normalized_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// ---------------------------------------------------------------------------
// Article lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    Scraped,
    Assessed,
    Enriched,
    Dropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Filter,
    Triage,
    Enrichment,
    Salvage,
    Synthesis,
    Judge,
    Commit,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Filter => "filter",
            Stage::Triage => "triage",
            Stage::Enrichment => "enrichment",
            Stage::Salvage => "salvage",
            Stage::Synthesis => "synthesis",
            Stage::Judge => "judge",
            Stage::Commit => "commit",
        };
        f.write_str(s)
    }
}

/// One entry in an article's ordered lifecycle trail. Every stage outcome —
/// success, drop, or error — is appended here with a human-readable reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailEntry {
    pub stage: Stage,
    pub status: String,
    pub reason: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyIndividual {
    pub name: String,
    /// Role in the story, e.g. "founder", "seller", "beneficiary".
    pub role: String,
    /// Relationship to the liquidity event, free text.
    #[serde(default)]
    pub relationship: Option<String>,
}

/// A scraped headline, enriched in place as it moves through the pipeline.
/// `link` is the natural unique key; repeated runs upsert, never duplicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub link: String,
    pub source: String,
    pub country: String,
    pub status: ArticleStatus,
    #[serde(default)]
    pub headline_score: Option<u8>,
    #[serde(default)]
    pub headline_rationale: Option<String>,
    #[serde(default)]
    pub content_score: Option<u8>,
    #[serde(default)]
    pub content_summary: Option<String>,
    #[serde(default)]
    pub key_individuals: Vec<KeyIndividual>,
    #[serde(default)]
    pub trail: Vec<TrailEntry>,
    pub scraped_at: DateTime<Utc>,
}

impl Article {
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        source: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            link: link.into(),
            source: source.into(),
            country: country.into(),
            status: ArticleStatus::Scraped,
            headline_score: None,
            headline_rationale: None,
            content_score: None,
            content_summary: None,
            key_individuals: Vec::new(),
            trail: Vec::new(),
            scraped_at: Utc::now(),
        }
    }

    /// Append a lifecycle trail entry.
    pub fn record(&mut self, stage: Stage, status: impl Into<String>, reason: impl Into<String>) {
        self.trail.push(TrailEntry {
            stage,
            status: status.into(),
            reason: reason.into(),
            at: Utc::now(),
        });
    }

    pub fn set_headline_score(&mut self, raw: i64, rationale: impl Into<String>) {
        self.headline_score = Some(clamp_score(raw));
        self.headline_rationale = Some(rationale.into());
        self.status = ArticleStatus::Assessed;
    }

    pub fn set_content_score(&mut self, raw: i64) {
        self.content_score = Some(clamp_score(raw));
    }

    /// The best score known for this article: content score when present,
    /// headline score otherwise.
    pub fn best_score(&self) -> u8 {
        self.content_score
            .or(self.headline_score)
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A synthesized narrative built from one or more articles describing the
/// same occurrence. `event_key` is the natural unique key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_key: String,
    pub headline: String,
    pub summary: String,
    pub country: String,
    /// Liquidity event classification, e.g. "acquisition", "ipo", "exit".
    pub classification: String,
    pub source_links: Vec<String>,
    pub highest_relevance_score: u8,
    #[serde(default)]
    pub key_individuals: Vec<KeyIndividual>,
    #[serde(default)]
    pub opportunity_names: Vec<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Opportunity
// ---------------------------------------------------------------------------

/// A long-lived dossier on a person or entity worth outreach. Keyed by
/// canonicalized display name; updated via monotone per-field merges,
/// never destructively overwritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub name: String,
    pub biography: String,
    #[serde(default)]
    pub reasons_to_contact: Vec<String>,
    /// Estimated wealth/liquidity in millions USD. Only ever increases.
    #[serde(default)]
    pub wealth_estimate_musd: f64,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub event_keys: Vec<String>,
    pub first_seen: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Opportunity {
    pub fn new(name: impl Into<String>, biography: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            biography: biography.into(),
            reasons_to_contact: Vec::new(),
            wealth_estimate_musd: 0.0,
            contact_email: None,
            embedding: Vec::new(),
            event_keys: Vec::new(),
            first_seen: now,
            last_updated: now,
        }
    }

    /// Text fields that feed the semantic embedding.
    pub fn embedding_text(&self) -> String {
        format!(
            "{}\n{}\n{}",
            self.name,
            self.biography,
            self.reasons_to_contact.join("\n")
        )
    }
}

// ---------------------------------------------------------------------------
// Watchlist
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Individual,
    Company,
    Family,
}

/// A tracked individual/company whose mention boosts headline relevance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistEntity {
    pub name: String,
    pub kind: EntityKind,
    /// Search aliases matched against headlines (word-boundary).
    #[serde(default)]
    pub terms: Vec<String>,
    /// None = global; Some(country) scopes matching to that country.
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub hit_count: u32,
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceAnalytics {
    pub runs: u32,
    pub successes: u32,
    pub failures: u32,
    pub headlines_scraped: u32,
    pub relevant_found: u32,
    /// Consecutive runs where content scraping failed for this source.
    /// High values flag selector maintenance.
    pub consecutive_scrape_failures: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub url: String,
    pub country: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub analytics: SourceAnalytics,
}

// ---------------------------------------------------------------------------
// Run audit
// ---------------------------------------------------------------------------

/// Funnel counters for a single pipeline run. Invariant:
/// relevant_headlines ≤ headlines_assessed ≤ fresh_headlines ≤ headlines_scraped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunnelStats {
    pub headlines_scraped: u32,
    pub fresh_headlines: u32,
    pub headlines_assessed: u32,
    pub relevant_headlines: u32,
    pub articles_enriched: u32,
    pub articles_dropped: u32,
    pub articles_salvaged: u32,
    pub salvage_failed: u32,
    pub events_synthesized: u32,
    pub events_below_threshold: u32,
    pub events_committed: u32,
    pub opportunities_created: u32,
    pub opportunities_updated: u32,
    pub judge_rejected: u32,
}

impl FunnelStats {
    /// Monotone funnel check used by the run report and tests.
    pub fn is_consistent(&self) -> bool {
        self.relevant_headlines <= self.headlines_assessed
            && self.headlines_assessed <= self.fresh_headlines
            && self.fresh_headlines <= self.headlines_scraped
    }
}

impl std::fmt::Display for FunnelStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Pipeline Run Complete ===")?;
        writeln!(f, "Headlines scraped:   {}", self.headlines_scraped)?;
        writeln!(f, "Fresh headlines:     {}", self.fresh_headlines)?;
        writeln!(f, "Headlines assessed:  {}", self.headlines_assessed)?;
        writeln!(f, "Relevant headlines:  {}", self.relevant_headlines)?;
        writeln!(f, "Articles enriched:   {}", self.articles_enriched)?;
        writeln!(f, "Articles dropped:    {}", self.articles_dropped)?;
        writeln!(
            f,
            "Salvaged:            {} ({} failed)",
            self.articles_salvaged, self.salvage_failed
        )?;
        writeln!(f, "Events synthesized:  {}", self.events_synthesized)?;
        writeln!(f, "Events committed:    {}", self.events_committed)?;
        writeln!(
            f,
            "Opportunities:       {} new, {} updated",
            self.opportunities_created, self.opportunities_updated
        )?;
        writeln!(f, "Judge rejected:      {}", self.judge_rejected)?;
        let assessed = self.headlines_assessed.max(1);
        writeln!(
            f,
            "Headline conversion: {:.0}%",
            self.relevant_headlines as f64 / assessed as f64 * 100.0
        )?;
        Ok(())
    }
}

/// Write-once audit record, one per pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunAudit {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub funnel: FunnelStats,
    pub judge_verdict: String,
    pub event_keys: Vec<String>,
    pub opportunity_names: Vec<String>,
    pub estimated_cost_cents: u64,
    pub errors: Vec<String>,
    /// Sources whose content scraping keeps failing and need selector work.
    pub failing_sources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_score_bounds() {
        assert_eq!(clamp_score(-5), 0);
        assert_eq!(clamp_score(0), 0);
        assert_eq!(clamp_score(72), 72);
        assert_eq!(clamp_score(100), 100);
        assert_eq!(clamp_score(140), 100);
    }

    #[test]
    fn normalized_name_collapses_case_and_whitespace() {
        assert_eq!(normalized_name("  Marta   Voss "), "marta voss");
        assert_eq!(normalized_name("MARTA VOSS"), "marta voss");
    }

    #[test]
    fn trail_records_in_order() {
        let mut article = Article::new("t", "https://x/1", "src", "CH");
        article.record(Stage::Triage, "assessed", "score 60");
        article.record(Stage::Enrichment, "enriched", "score 80");
        assert_eq!(article.trail.len(), 2);
        assert_eq!(article.trail[0].stage, Stage::Triage);
        assert_eq!(article.trail[1].stage, Stage::Enrichment);
    }

    #[test]
    fn funnel_consistency() {
        let mut funnel = FunnelStats {
            headlines_scraped: 10,
            fresh_headlines: 8,
            headlines_assessed: 8,
            relevant_headlines: 3,
            ..Default::default()
        };
        assert!(funnel.is_consistent());
        funnel.relevant_headlines = 9;
        assert!(!funnel.is_consistent());
    }
}
