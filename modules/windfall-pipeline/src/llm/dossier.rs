use ai_client::Claude;
use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::truncate;

const MAX_INTEL_BYTES: usize = 20_000;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DossierDraft {
    /// Narrative biography focused on wealth provenance and current position.
    pub biography: String,
    #[serde(default)]
    pub reasons_to_contact: Vec<String>,
    /// Estimated wealth/liquidity in millions USD. 0 if unknown.
    pub wealth_estimate_musd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct CanonicalNameResponse {
    /// The single canonical display form of the name.
    canonical_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct ContactResponse {
    /// Best email address found, or null when none is supported by the text.
    email: Option<String>,
}

#[async_trait]
pub trait DossierWriter: Send + Sync {
    /// Compose a new dossier from event intelligence.
    async fn compose(&self, name: &str, intelligence: &str) -> Result<DossierDraft>;

    /// Rewrite an existing biography to incorporate new intelligence.
    async fn rewrite_biography(&self, existing: &str, intelligence: &str) -> Result<String>;

    /// Resolve name variants to one canonical display form.
    async fn canonical_name(&self, name: &str) -> Result<String>;

    /// Extract a contact email for the subject from search-result text.
    async fn extract_contact(&self, name: &str, search_results: &str) -> Result<Option<String>>;
}

const COMPOSE_PROMPT: &str = r#"You write dossiers for a private-wealth prospecting desk.

From the supplied intelligence, write a dossier on the named subject:
- biography: 3-6 sentences on who they are, where their wealth comes from, and their current position. Strictly factual, grounded in the supplied text.
- reasons_to_contact: concrete, event-anchored reasons for outreach (one per distinct reason).
- wealth_estimate_musd: your best estimate of their investable liquidity in millions USD from the material; 0 if it gives no basis.

Never invent facts not supported by the intelligence."#;

const REWRITE_PROMPT: &str = r#"You maintain dossiers for a private-wealth prospecting desk.

Merge the new intelligence into the existing biography. Keep every established fact unless the new intelligence directly supersedes it, integrate what is genuinely new, and keep the result to at most 8 sentences. Return only the rewritten biography text."#;

const CANONICAL_PROMPT: &str = r#"Resolve the given person/entity name to its single canonical display form: full name, standard spelling, no honorifics, no possessives ("Dr. M. Voss's" -> "Marta Voss" only if the full name is inferable, otherwise "M. Voss"). If the name is already canonical, return it unchanged."#;

const CONTACT_PROMPT: &str = r#"You extract contact details from web search results.

Find an email address that credibly belongs to the named subject (their own or their family office / holding company). Only return an address that appears in the text. Prefer personal or office addresses over generic press@ inboxes. Return null when nothing credible appears."#;

pub struct ClaudeDossierWriter {
    claude: Claude,
}

impl ClaudeDossierWriter {
    pub fn new(anthropic_api_key: &str, model: &str) -> Self {
        Self {
            claude: Claude::new(anthropic_api_key, model),
        }
    }
}

#[async_trait]
impl DossierWriter for ClaudeDossierWriter {
    async fn compose(&self, name: &str, intelligence: &str) -> Result<DossierDraft> {
        let user_prompt = format!(
            "Subject: {name}\n\nIntelligence:\n{}",
            truncate(intelligence, MAX_INTEL_BYTES)
        );
        self.claude.extract(COMPOSE_PROMPT, &user_prompt).await
    }

    async fn rewrite_biography(&self, existing: &str, intelligence: &str) -> Result<String> {
        let user_prompt = format!(
            "Existing biography:\n{}\n\nNew intelligence:\n{}",
            truncate(existing, MAX_INTEL_BYTES),
            truncate(intelligence, MAX_INTEL_BYTES)
        );
        self.claude.chat_completion(REWRITE_PROMPT, &user_prompt).await
    }

    async fn canonical_name(&self, name: &str) -> Result<String> {
        let response: CanonicalNameResponse = self
            .claude
            .extract(CANONICAL_PROMPT, format!("Name: {name}"))
            .await?;
        Ok(response.canonical_name)
    }

    async fn extract_contact(&self, name: &str, search_results: &str) -> Result<Option<String>> {
        let user_prompt = format!(
            "Subject: {name}\n\nSearch results:\n{}",
            truncate(search_results, MAX_INTEL_BYTES)
        );
        let response: ContactResponse = self.claude.extract(CONTACT_PROMPT, &user_prompt).await?;
        Ok(response.email)
    }
}
