use ai_client::Embeddings;
use anyhow::Result;

// --- TextEmbedder trait ---

#[async_trait::async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;
}

/// Wrapper around Voyage AI embeddings via the OpenAI-compatible API.
pub struct Embedder {
    client: Embeddings,
}

impl Embedder {
    pub fn new(voyage_api_key: &str, model: &str) -> Self {
        let client =
            Embeddings::new(voyage_api_key, model).with_base_url("https://api.voyageai.com/v1");
        Self { client }
    }
}

#[async_trait::async_trait]
impl TextEmbedder for Embedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(text.to_string()).await
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        self.client.embed_batch(texts).await
    }
}
