//! Embedding index over Postgres.
//!
//! Vectors live in a single `embeddings` table under a `{type}_{id}` id
//! scheme ("event_<key>", "article_<uuid>", "opportunity_<name>").
//! Nearest-neighbor queries pull candidates of the requested kind and rank
//! by cosine similarity in process; corpus sizes here are thousands, not
//! millions, so a recall cap keeps queries bounded.

use anyhow::Result;
use serde_json::Value;
use sqlx::PgPool;

/// Upper bound on candidates pulled per query, newest first.
const RECALL_CAP: i64 = 5000;

#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub similarity: f64,
    pub metadata: Value,
}

#[derive(Clone)]
pub struct PgVectorIndex {
    pool: PgPool,
}

impl PgVectorIndex {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS embeddings (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                vector JSONB NOT NULL,
                metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS embeddings_kind_idx ON embeddings (kind)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn upsert(
        &self,
        id: &str,
        kind: &str,
        vector: &[f32],
        metadata: &Value,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO embeddings (id, kind, vector, metadata, updated_at)
            VALUES ($1, $2, $3, $4, now())
            ON CONFLICT (id) DO UPDATE
            SET kind = EXCLUDED.kind,
                vector = EXCLUDED.vector,
                metadata = EXCLUDED.metadata,
                updated_at = now()
            "#,
        )
        .bind(id)
        .bind(kind)
        .bind(serde_json::to_value(vector)?)
        .bind(metadata)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        kind: Option<&str>,
    ) -> Result<Vec<VectorHit>> {
        let rows: Vec<(String, Value, Value)> = match kind {
            Some(kind) => {
                sqlx::query_as(
                    "SELECT id, vector, metadata FROM embeddings WHERE kind = $1 \
                     ORDER BY updated_at DESC LIMIT $2",
                )
                .bind(kind)
                .bind(RECALL_CAP)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    "SELECT id, vector, metadata FROM embeddings \
                     ORDER BY updated_at DESC LIMIT $1",
                )
                .bind(RECALL_CAP)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut hits: Vec<VectorHit> = rows
            .into_iter()
            .filter_map(|(id, stored, metadata)| {
                let candidate: Vec<f32> = serde_json::from_value(stored).ok()?;
                Some(VectorHit {
                    id,
                    similarity: cosine_similarity(vector, &candidate),
                    metadata,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(top_k);
        Ok(hits)
    }
}

/// Cosine similarity for f32 embedding vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_handles_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }
}
