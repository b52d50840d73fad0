use ai_client::Claude;
use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{truncate, ExtractedIndividual};

const MAX_CONTENT_BYTES: usize = 30_000;

/// Cheap pre-assessment verdict: is this content in scope at all?
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TriageVerdict {
    pub in_scope: bool,
    pub reason: String,
}

/// Full content assessment result.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ContentAssessment {
    /// Relevance score 0-100 based on the full article body.
    pub score: i64,
    /// Two-to-three sentence summary of the wealth-relevant substance.
    pub summary: String,
    #[serde(default)]
    pub key_individuals: Vec<ExtractedIndividual>,
}

#[async_trait]
pub trait ContentAssessor: Send + Sync {
    /// Cheap scope triage before paying for a full assessment.
    async fn triage(&self, title: &str, content: &str) -> Result<TriageVerdict>;

    /// Full assessment: final relevance score plus key-individual extraction.
    async fn assess(&self, title: &str, content: &str) -> Result<ContentAssessment>;
}

const CONTENT_TRIAGE_PROMPT: &str = r#"You are a scope gate for a private-wealth prospecting desk.

Given a news article, decide whether it is IN SCOPE: it concerns private individuals, families, founders, or privately held companies and a wealth or liquidity event.

OUT of scope (reject):
- Purely public-company coverage with no named private beneficiary (index moves, analyst ratings, institutional M&A where sellers are funds)
- Macro/economic commentary, politics, sports, entertainment gossip
- Crime, accidents, weather, human-interest with no wealth angle

When in doubt about a concrete transaction with potentially private sellers, keep it in scope. Give a one-sentence reason either way."#;

const CONTENT_ASSESSMENT_PROMPT: &str = r#"You are a senior analyst at a private-wealth prospecting desk.

Read the article and produce:
1. score (0-100): how strongly this describes a private liquidity/wealth event with identifiable beneficiaries. Use the full range; 80+ means named individuals with significant realized or imminent liquidity.
2. summary: 2-3 sentences covering WHO gains wealth, from WHAT event, and roughly HOW MUCH if stated.
3. key_individuals: every named person who plausibly gains liquidity — founders, sellers, heirs, departing executives. Include their role and their relationship to the event. Do NOT include advisors, lawyers, spokespeople, or buyers' employees."#;

pub struct ClaudeContentAssessor {
    triage_claude: Claude,
    assess_claude: Claude,
}

impl ClaudeContentAssessor {
    pub fn new(anthropic_api_key: &str, triage_model: &str, assessment_model: &str) -> Self {
        Self {
            triage_claude: Claude::new(anthropic_api_key, triage_model),
            assess_claude: Claude::new(anthropic_api_key, assessment_model),
        }
    }
}

#[async_trait]
impl ContentAssessor for ClaudeContentAssessor {
    async fn triage(&self, title: &str, content: &str) -> Result<TriageVerdict> {
        let user_prompt = format!(
            "Title: {title}\n\n---\n\n{}",
            truncate(content, MAX_CONTENT_BYTES)
        );
        self.triage_claude
            .extract(CONTENT_TRIAGE_PROMPT, &user_prompt)
            .await
    }

    async fn assess(&self, title: &str, content: &str) -> Result<ContentAssessment> {
        let user_prompt = format!(
            "Title: {title}\n\n---\n\n{}",
            truncate(content, MAX_CONTENT_BYTES)
        );
        self.assess_claude
            .extract(CONTENT_ASSESSMENT_PROMPT, &user_prompt)
            .await
    }
}
