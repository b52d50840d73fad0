use ai_client::Claude;
use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QualityLabel {
    Excellent,
    Good,
    Poor,
    Irrelevant,
}

impl QualityLabel {
    pub fn passes(self) -> bool {
        matches!(self, QualityLabel::Excellent | QualityLabel::Good)
    }
}

/// Lightweight summary of one candidate sent for holistic review.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewItem {
    /// `event_<key>` or `opportunity_<name>`.
    pub id: String,
    pub text: String,
    pub score: u8,
    pub rationale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReviewVerdict {
    pub id: String,
    pub label: QualityLabel,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct ReviewResponse {
    #[serde(default)]
    verdicts: Vec<ReviewVerdict>,
}

#[async_trait]
pub trait QualityJudge: Send + Sync {
    /// Review every candidate from this run in one call.
    async fn review(&self, items: &[ReviewItem]) -> Result<Vec<ReviewVerdict>>;
}

const JUDGE_PROMPT: &str = r#"You are the final quality gate for a private-wealth prospecting pipeline. You review the run's candidate events and opportunity dossiers as a set.

Label each item:
- excellent: specific, credible, clearly actionable for outreach
- good: solid, worth persisting, minor gaps
- poor: vague, generic, or weakly supported by its own rationale
- irrelevant: not actually a private-wealth signal (public-market noise, no identifiable beneficiary)

Judge each item on its own text and score; do not reward volume. Return a verdict for every item id you were given."#;

pub struct ClaudeQualityJudge {
    claude: Claude,
}

impl ClaudeQualityJudge {
    pub fn new(anthropic_api_key: &str, model: &str) -> Self {
        Self {
            claude: Claude::new(anthropic_api_key, model),
        }
    }
}

#[async_trait]
impl QualityJudge for ClaudeQualityJudge {
    async fn review(&self, items: &[ReviewItem]) -> Result<Vec<ReviewVerdict>> {
        let listing: Vec<String> = items
            .iter()
            .map(|i| {
                format!(
                    "- id: {}\n  score: {}\n  text: {}\n  rationale: {}",
                    i.id, i.score, i.text, i.rationale
                )
            })
            .collect();
        let user_prompt = format!(
            "Review these {} candidates:\n\n{}",
            items.len(),
            listing.join("\n")
        );

        debug!(items = items.len(), "Quality review request");
        let response: ReviewResponse = self.claude.extract(JUDGE_PROMPT, &user_prompt).await?;
        Ok(response.verdicts)
    }
}
