//! Production implementations of the external fetch/search/notify contracts.
//!
//! Pages come from a Firecrawl-compatible render API (JS rendering plus
//! readability extraction happen service-side); web and news search use a
//! Serper-compatible endpoint; encyclopedia summaries come from the
//! Wikipedia REST API, which needs no key.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use windfall_common::types::{Event, Opportunity};

use crate::traits::{ContentFetcher, FetchedPage, Notifier, SearchResult};

const FIRECRAWL_API_URL: &str = "https://api.firecrawl.dev/v1";
const SERPER_API_URL: &str = "https://google.serper.dev";
const WIKIPEDIA_SUMMARY_URL: &str = "https://en.wikipedia.org/api/rest_v1/page/summary";

const FETCH_TIMEOUT: Duration = Duration::from_secs(45);

pub struct WebFetcher {
    scrape_api_key: String,
    search_api_key: String,
    http: reqwest::Client,
}

impl WebFetcher {
    pub fn new(scrape_api_key: &str, search_api_key: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            scrape_api_key: scrape_api_key.to_string(),
            search_api_key: search_api_key.to_string(),
            http,
        }
    }

    async fn serper(&self, endpoint: &str, query: &str) -> Result<Vec<SearchResult>> {
        debug!(endpoint, query, "Search request");
        let response = self
            .http
            .post(format!("{SERPER_API_URL}/{endpoint}"))
            .header("X-API-KEY", &self.search_api_key)
            .json(&json!({ "q": query, "num": 10 }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(anyhow!("Search API error ({status}) for query: {query}"));
        }

        let body: SerperResponse = response.json().await?;
        let entries = if endpoint == "news" {
            body.news
        } else {
            body.organic
        };
        Ok(entries
            .into_iter()
            .map(|e| SearchResult {
                title: e.title,
                url: e.link,
                snippet: e.snippet.unwrap_or_default(),
            })
            .collect())
    }
}

#[async_trait]
impl ContentFetcher for WebFetcher {
    async fn page(&self, url: &str) -> Result<FetchedPage> {
        let parsed = url::Url::parse(url)?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            anyhow::bail!("Only http/https URLs are allowed, got: {}", parsed.scheme());
        }

        debug!(url, "Scrape request");
        let response = self
            .http
            .post(format!("{FIRECRAWL_API_URL}/scrape"))
            .bearer_auth(&self.scrape_api_key)
            .json(&json!({ "url": url, "formats": ["markdown"] }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(anyhow!("Scrape API error ({status}) for {url}"));
        }

        let body: ScrapeResponse = response.json().await?;
        if !body.success {
            return Err(anyhow!("Scrape failed for {url}"));
        }
        Ok(FetchedPage {
            url: url.to_string(),
            text: body.data.markdown.unwrap_or_default(),
        })
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.serper("search", query).await
    }

    async fn news(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.serper("news", query).await
    }

    async fn encyclopedia(&self, topic: &str) -> Result<Option<String>> {
        let slug = topic.trim().replace(' ', "_");
        let response = self
            .http
            .get(format!("{WIKIPEDIA_SUMMARY_URL}/{slug}"))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            return Err(anyhow!("Encyclopedia lookup error ({status}) for {topic}"));
        }

        let body: WikiSummary = response.json().await?;
        Ok(body.extract)
    }
}

#[derive(Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: ScrapeData,
}

#[derive(Deserialize, Default)]
struct ScrapeData {
    markdown: Option<String>,
}

#[derive(Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperEntry>,
    #[serde(default)]
    news: Vec<SerperEntry>,
}

#[derive(Deserialize)]
struct SerperEntry {
    title: String,
    link: String,
    snippet: Option<String>,
}

#[derive(Deserialize)]
struct WikiSummary {
    extract: Option<String>,
}

// ---------------------------------------------------------------------------
// Notifier implementations
// ---------------------------------------------------------------------------

/// Posts a digest of newly committed items to the notification dispatcher,
/// which owns rendering and delivery.
pub struct WebhookNotifier {
    webhook_url: String,
    recipients: Vec<String>,
    http: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(webhook_url: &str, recipients: Vec<String>) -> Self {
        Self {
            webhook_url: webhook_url.to_string(),
            recipients,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, events: &[Event], opportunities: &[Opportunity]) -> Result<()> {
        let payload = json!({
            "recipients": self.recipients,
            "events": events.iter().map(|e| json!({
                "event_key": e.event_key,
                "headline": e.headline,
                "summary": e.summary,
                "country": e.country,
                "score": e.highest_relevance_score,
            })).collect::<Vec<_>>(),
            "opportunities": opportunities.iter().map(|o| json!({
                "name": o.name,
                "reasons": o.reasons_to_contact,
                "wealth_estimate_musd": o.wealth_estimate_musd,
            })).collect::<Vec<_>>(),
        });

        let response = self.http.post(&self.webhook_url).json(&payload).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(anyhow!("Notification dispatch error ({status})"));
        }
        Ok(())
    }
}

/// Fallback notifier used when no webhook is configured: logs the digest.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, events: &[Event], opportunities: &[Opportunity]) -> Result<()> {
        tracing::info!(
            events = events.len(),
            opportunities = opportunities.len(),
            "Notification (no webhook configured)"
        );
        Ok(())
    }
}
