use ai_client::Claude;
use anyhow::{bail, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One headline prepared for classification: country context and watchlist
/// hits are annotated before the call so the model sees them.
#[derive(Debug, Clone)]
pub struct HeadlineForAssessment {
    pub title: String,
    pub country: String,
    pub watchlist_hits: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HeadlineVerdict {
    /// Relevance score 0-100.
    pub score: i64,
    pub rationale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct BatchResponse {
    /// One verdict per input headline, in input order.
    #[serde(default)]
    verdicts: Vec<HeadlineVerdict>,
}

#[async_trait]
pub trait HeadlineClassifier: Send + Sync {
    /// Classify a batch; must return exactly one verdict per input, in
    /// order. A count mismatch is an error (the caller degrades to
    /// per-item classification).
    async fn assess_batch(&self, batch: &[HeadlineForAssessment]) -> Result<Vec<HeadlineVerdict>>;

    /// Per-item fallback classification.
    async fn assess_single(&self, item: &HeadlineForAssessment) -> Result<HeadlineVerdict>;
}

const TRIAGE_SYSTEM_PROMPT: &str = r#"You are a relevance screener for a private-wealth prospecting desk.

You score news headlines 0-100 for how likely they are to describe a PRIVATE liquidity or wealth event worth researching: a company sale or acquisition, a stake disposal, an IPO or exit by founders, an inheritance or succession, a major asset sale, a lottery-scale windfall, or a senior executive departure with equity.

Scoring guide:
- 80-100: clearly names private individuals/families gaining significant liquidity
- 50-79: a concrete transaction or succession where beneficiaries are likely identifiable
- 20-49: business news with a plausible but unconfirmed private-wealth angle
- 0-19: public-market noise, macro commentary, sports, politics, crime, human interest

A headline mentioning a tracked watchlist entity is flagged in the input; weigh that as a strong positive signal but still score the substance.

Return one verdict per headline, in the same order as the input. Never skip or reorder items."#;

pub struct ClaudeHeadlineClassifier {
    claude: Claude,
}

impl ClaudeHeadlineClassifier {
    pub fn new(anthropic_api_key: &str, model: &str) -> Self {
        Self {
            claude: Claude::new(anthropic_api_key, model),
        }
    }

    fn render_item(index: usize, item: &HeadlineForAssessment) -> String {
        let watchlist = if item.watchlist_hits.is_empty() {
            String::new()
        } else {
            format!(" [watchlist: {}]", item.watchlist_hits.join(", "))
        };
        format!(
            "{}. ({}) {}{}",
            index + 1,
            item.country,
            item.title,
            watchlist
        )
    }
}

#[async_trait]
impl HeadlineClassifier for ClaudeHeadlineClassifier {
    async fn assess_batch(&self, batch: &[HeadlineForAssessment]) -> Result<Vec<HeadlineVerdict>> {
        let rendered: Vec<String> = batch
            .iter()
            .enumerate()
            .map(|(i, item)| Self::render_item(i, item))
            .collect();
        let user_prompt = format!(
            "Score these {} headlines:\n\n{}",
            batch.len(),
            rendered.join("\n")
        );

        debug!(count = batch.len(), "Headline batch classification");
        let response: BatchResponse = self
            .claude
            .extract(TRIAGE_SYSTEM_PROMPT, &user_prompt)
            .await?;

        if response.verdicts.len() != batch.len() {
            bail!(
                "Batch verdict count mismatch: sent {}, got {}",
                batch.len(),
                response.verdicts.len()
            );
        }
        Ok(response.verdicts)
    }

    async fn assess_single(&self, item: &HeadlineForAssessment) -> Result<HeadlineVerdict> {
        let user_prompt = format!("Score this headline:\n\n{}", Self::render_item(0, item));
        let response: BatchResponse = self
            .claude
            .extract(TRIAGE_SYSTEM_PROMPT, &user_prompt)
            .await?;
        response
            .verdicts
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty verdict list for single headline"))
    }
}
