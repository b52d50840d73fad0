//! LLM-backed services, one per pipeline concern. Each file pairs a trait
//! (so tests can script responses) with a production implementation that
//! wraps `ai_client::Claude` and a schemars-typed response validated at the
//! boundary.

pub mod assessment;
pub mod composer;
pub mod dossier;
pub mod headline;
pub mod judge;

pub use assessment::{ClaudeContentAssessor, ContentAssessment, ContentAssessor, TriageVerdict};
pub use composer::{
    ArticleDigest, CandidateEvent, CandidateOpportunity, ClaudeEventComposer, ClusterAssignment,
    EventComposer, EventContext,
};
pub use dossier::{ClaudeDossierWriter, DossierDraft, DossierWriter};
pub use headline::{
    ClaudeHeadlineClassifier, HeadlineClassifier, HeadlineForAssessment, HeadlineVerdict,
};
pub use judge::{ClaudeQualityJudge, QualityJudge, QualityLabel, ReviewItem, ReviewVerdict};

/// Shared shape for individuals named by extraction/synthesis calls.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, schemars::JsonSchema)]
pub struct ExtractedIndividual {
    pub name: String,
    /// Role in the story, e.g. "founder", "seller", "heir".
    pub role: String,
    /// Relationship to the liquidity event, free text.
    pub relationship: Option<String>,
}

impl From<ExtractedIndividual> for windfall_common::types::KeyIndividual {
    fn from(e: ExtractedIndividual) -> Self {
        Self {
            name: e.name,
            role: e.role,
            relationship: e.relationship,
        }
    }
}

/// Truncate content to stay inside model token limits, respecting char
/// boundaries.
pub(crate) fn truncate(content: &str, max_bytes: usize) -> &str {
    if content.len() <= max_bytes {
        return content;
    }
    let mut end = max_bytes;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    &content[..end]
}
