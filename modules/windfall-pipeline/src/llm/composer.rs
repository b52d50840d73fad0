use ai_client::Claude;
use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{truncate, ExtractedIndividual};

const MAX_CONTEXT_BYTES: usize = 40_000;

/// Compact article view passed to clustering and synthesis.
#[derive(Debug, Clone, Serialize)]
pub struct ArticleDigest {
    pub link: String,
    pub title: String,
    pub summary: String,
    pub score: u8,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClusterAssignment {
    /// Stable kebab-case key derived from the underlying occurrence,
    /// e.g. "helvetia-robotics-acquisition-2026". Reused verbatim as the
    /// event key so repeated runs converge on the same document.
    pub cluster_key: String,
    /// Links of the articles in this cluster.
    pub article_links: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct ClusterResponse {
    #[serde(default)]
    clusters: Vec<ClusterAssignment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CandidateEvent {
    pub headline: String,
    pub summary: String,
    /// Liquidity event classification, e.g. "acquisition", "ipo",
    /// "succession", "asset_sale".
    pub classification: String,
    #[serde(default)]
    pub key_individuals: Vec<ExtractedIndividual>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct SynthesisResponse {
    #[serde(default)]
    events: Vec<CandidateEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CandidateOpportunity {
    /// Display name of the person or entity worth outreach.
    pub name: String,
    /// One concrete reason to contact them now.
    pub reason: String,
    /// Estimated wealth/liquidity from this event, millions USD. 0 if unknown.
    pub wealth_estimate_musd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct OpportunityResponse {
    #[serde(default)]
    opportunities: Vec<CandidateOpportunity>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct EntityResponse {
    #[serde(default)]
    entities: Vec<String>,
}

/// Structured context payload assembled by the context-enrichment stage and
/// handed to synthesis and opportunity generation.
#[derive(Debug, Clone, Default)]
pub struct EventContext {
    pub cluster_key: String,
    pub country: String,
    pub max_score: u8,
    pub articles: Vec<ArticleDigest>,
    pub entities: Vec<String>,
    /// Snippets of semantically similar historical articles.
    pub historical: Vec<String>,
    /// (entity, encyclopedia summary) pairs.
    pub encyclopedia: Vec<(String, String)>,
    /// Recent-news snippets for the primary headline.
    pub recent_news: Vec<String>,
}

impl EventContext {
    /// Render the payload for a synthesis prompt.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("## Articles\n");
        for a in &self.articles {
            out.push_str(&format!(
                "- [{}] {} (score {}): {}\n",
                a.country, a.title, a.score, a.summary
            ));
        }
        if !self.entities.is_empty() {
            out.push_str(&format!("\n## Named entities\n{}\n", self.entities.join(", ")));
        }
        if !self.historical.is_empty() {
            out.push_str("\n## Related historical coverage\n");
            for h in &self.historical {
                out.push_str(&format!("- {h}\n"));
            }
        }
        if !self.encyclopedia.is_empty() {
            out.push_str("\n## Background\n");
            for (entity, summary) in &self.encyclopedia {
                out.push_str(&format!("- {entity}: {summary}\n"));
            }
        }
        if !self.recent_news.is_empty() {
            out.push_str("\n## Recent related news\n");
            for n in &self.recent_news {
                out.push_str(&format!("- {n}\n"));
            }
        }
        out
    }
}

#[async_trait]
pub trait EventComposer: Send + Sync {
    /// Group article links into clusters describing the same occurrence.
    /// Articles the model cannot confidently cluster are simply omitted.
    async fn cluster(&self, articles: &[ArticleDigest]) -> Result<Vec<ClusterAssignment>>;

    /// Named-entity extraction over combined cluster text.
    async fn extract_entities(&self, text: &str) -> Result<Vec<String>>;

    /// Synthesize one or more candidate events from a cluster's context.
    async fn synthesize(&self, context: &EventContext) -> Result<Vec<CandidateEvent>>;

    /// Generate candidate opportunities for an accepted event.
    async fn generate_opportunities(
        &self,
        event_headline: &str,
        event_summary: &str,
        context: &EventContext,
    ) -> Result<Vec<CandidateOpportunity>>;
}

const CLUSTER_PROMPT: &str = r#"You group news articles by underlying occurrence for a private-wealth prospecting desk.

Two articles belong to the same cluster when they describe the SAME real-world event (same transaction, same people, same company), even with different emphasis. Do not cluster articles merely because they share an industry or country.

For each cluster, produce a stable kebab-case cluster_key derived from the subject and event type (e.g. "helvetia-robotics-acquisition"). The key must not depend on which articles happened to be in the batch. List each article's link in exactly one cluster, or omit the article if it stands alone."#;

const ENTITY_PROMPT: &str = r#"Extract the named entities (people, companies, families, funds) from the text. Return each name once, in its most complete form found in the text. No descriptions."#;

const SYNTHESIS_PROMPT: &str = r#"You are a senior editor at a private-wealth prospecting desk.

From the supplied articles and context, synthesize the canonical event(s) they describe. Usually one cluster yields one event; split only when the coverage genuinely describes distinct occurrences.

For each event produce:
- headline: one crisp factual sentence, no hype
- summary: 3-5 sentences; who gains wealth, from what, how much, and what happens next
- classification: acquisition | ipo | stake_sale | succession | asset_sale | windfall | executive_exit | other
- key_individuals: every person who plausibly gains liquidity, with role and relationship

Write from the evidence given. Never invent names or figures not present in the context."#;

const OPPORTUNITY_PROMPT: &str = r#"You are a business-development researcher for a private bank.

Given a synthesized liquidity event and its context, list the individuals (or family entities) worth proactive outreach because this event plausibly gives them significant investable liquidity.

For each: their display name, one concrete reason to contact them that references this event, and an estimated liquidity in millions USD (0 if the material gives no basis). Exclude buyers' employees, advisors, and anyone whose gain is institutional rather than personal. An empty list is a valid answer."#;

pub struct ClaudeEventComposer {
    claude: Claude,
}

impl ClaudeEventComposer {
    pub fn new(anthropic_api_key: &str, model: &str) -> Self {
        Self {
            claude: Claude::new(anthropic_api_key, model),
        }
    }
}

#[async_trait]
impl EventComposer for ClaudeEventComposer {
    async fn cluster(&self, articles: &[ArticleDigest]) -> Result<Vec<ClusterAssignment>> {
        let listing: Vec<String> = articles
            .iter()
            .map(|a| format!("- link: {}\n  title: {}\n  summary: {}", a.link, a.title, a.summary))
            .collect();
        let user_prompt = format!(
            "Cluster these {} articles by underlying occurrence:\n\n{}",
            articles.len(),
            listing.join("\n")
        );

        debug!(articles = articles.len(), "Clustering request");
        let response: ClusterResponse = self.claude.extract(CLUSTER_PROMPT, &user_prompt).await?;
        Ok(response.clusters)
    }

    async fn extract_entities(&self, text: &str) -> Result<Vec<String>> {
        let response: EntityResponse = self
            .claude
            .extract(ENTITY_PROMPT, truncate(text, MAX_CONTEXT_BYTES))
            .await?;
        Ok(response.entities)
    }

    async fn synthesize(&self, context: &EventContext) -> Result<Vec<CandidateEvent>> {
        let rendered = context.render();
        let response: SynthesisResponse = self
            .claude
            .extract(SYNTHESIS_PROMPT, truncate(&rendered, MAX_CONTEXT_BYTES))
            .await?;
        Ok(response.events)
    }

    async fn generate_opportunities(
        &self,
        event_headline: &str,
        event_summary: &str,
        context: &EventContext,
    ) -> Result<Vec<CandidateOpportunity>> {
        let user_prompt = format!(
            "Event: {event_headline}\n\n{event_summary}\n\n---\n\n{}",
            context.render()
        );
        let response: OpportunityResponse = self
            .claude
            .extract(OPPORTUNITY_PROMPT, truncate(&user_prompt, MAX_CONTEXT_BYTES))
            .await?;
        Ok(response.opportunities)
    }
}
