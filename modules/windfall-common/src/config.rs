use std::env;

use serde::{Deserialize, Serialize};

/// Process configuration loaded from environment variables.
/// Panics with a clear message if required vars are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,

    // AI providers
    pub anthropic_api_key: String,
    pub voyage_api_key: String,

    // Scraping / search collaborators
    pub scrape_api_key: String,
    pub search_api_key: String,

    // Notification dispatch
    pub notify_webhook_url: Option<String>,
    pub notify_recipients: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            anthropic_api_key: required_env("ANTHROPIC_API_KEY"),
            voyage_api_key: required_env("VOYAGE_API_KEY"),
            scrape_api_key: required_env("SCRAPE_API_KEY"),
            search_api_key: required_env("SEARCH_API_KEY"),
            notify_webhook_url: env::var("NOTIFY_WEBHOOK_URL").ok(),
            notify_recipients: env::var("NOTIFY_RECIPIENTS")
                .unwrap_or_default()
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.trim().to_string())
                .collect(),
        }
    }

    pub fn log_redacted(&self) {
        tracing::info!(
            database = redact(&self.database_url),
            recipients = self.notify_recipients.len(),
            "Config loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn redact(value: &str) -> String {
    match value.split('@').last() {
        Some(tail) if tail != value => format!("***@{tail}"),
        _ => "***".to_string(),
    }
}

// ---------------------------------------------------------------------------
// RunSettings — per-run snapshot of runtime-tunable knobs
// ---------------------------------------------------------------------------

/// Tunable thresholds and limits. Stored in the `settings` collection and
/// snapshotted ONCE at the start of each run into an immutable value passed
/// by reference through every stage, so a mid-run settings edit can never
/// change behavior partway through.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Minimum headline score to pass triage into enrichment.
    pub headline_relevance_threshold: u8,
    /// Minimum content score for an enriched article to feed clustering.
    pub article_relevance_threshold: u8,
    /// Minimum cluster max score for an event to be eligible for commit.
    pub event_relevance_threshold: u8,
    /// Headline score at or above which a failed scrape enters salvage.
    pub high_signal_headline_threshold: u8,
    /// Unclustered articles at or above this are promoted to singleton clusters.
    pub singleton_promotion_threshold: u8,
    /// Score boost applied to watchlist hits, capped at 100.
    pub watchlist_boost: u8,
    /// Headlines per batched classification call.
    pub batch_size: usize,
    /// Worker-pool ceiling for content enrichment.
    pub enrichment_concurrency: usize,
    /// Worker-pool ceiling for per-cluster synthesis.
    pub synthesis_concurrency: usize,
    /// Maximum alternative-source fetches during salvage.
    pub salvage_attempts: usize,
    /// Nearest-neighbor count for historical context lookup.
    pub context_neighbors: usize,

    // Model routing
    pub triage_model: String,
    pub assessment_model: String,
    pub synthesis_model: String,
    pub judge_model: String,
    pub embedding_model: String,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            headline_relevance_threshold: 40,
            article_relevance_threshold: 50,
            event_relevance_threshold: 55,
            high_signal_headline_threshold: 90,
            singleton_promotion_threshold: 75,
            watchlist_boost: 15,
            batch_size: 8,
            enrichment_concurrency: 5,
            synthesis_concurrency: 3,
            salvage_attempts: 2,
            context_neighbors: 5,
            triage_model: "claude-haiku-4-5-20251001".to_string(),
            assessment_model: "claude-sonnet-4-5-20250929".to_string(),
            synthesis_model: "claude-sonnet-4-5-20250929".to_string(),
            judge_model: "claude-sonnet-4-5-20250929".to_string(),
            embedding_model: "voyage-3-large".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_defaults_are_sane() {
        let s = RunSettings::default();
        assert!(s.headline_relevance_threshold < s.article_relevance_threshold);
        assert!(s.article_relevance_threshold < s.event_relevance_threshold);
        assert!(s.high_signal_headline_threshold > s.event_relevance_threshold);
        assert_eq!(s.batch_size, 8);
        assert_eq!(s.salvage_attempts, 2);
    }

    #[test]
    fn settings_deserialize_with_partial_overrides() {
        let s: RunSettings =
            serde_json::from_str(r#"{"event_relevance_threshold": 70}"#).unwrap();
        assert_eq!(s.event_relevance_threshold, 70);
        assert_eq!(s.batch_size, 8);
    }
}
