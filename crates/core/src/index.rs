use crate::embeddings::Embedder;
use crate::error::ChatError;
use crate::models::{ScoredChunk, VectorEntry};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const SNAPSHOT_VERSION: u32 = 1;

/// In-memory similarity index over embedded chunks. Entries are immutable
/// once inserted; replacing the corpus means building a fresh index.
pub struct VectorIndex {
    entries: Vec<VectorEntry>,
    dimensions: usize,
    model: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexSnapshot {
    version: u32,
    model: String,
    dimensions: usize,
    entries: Vec<VectorEntry>,
}

impl VectorIndex {
    /// Embeds every chunk in one batched call and stores (text, embedding)
    /// pairs. All-or-nothing: any embedding failure leaves no index behind.
    pub async fn build<E>(chunks: &[String], embedder: &E) -> Result<Self, ChatError>
    where
        E: Embedder + Sync + ?Sized,
    {
        let embeddings = embedder.embed(chunks).await?;

        if embeddings.len() != chunks.len() {
            return Err(ChatError::Embedding(format!(
                "embedding count {} does not match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let dimensions = embedder.dimensions();
        for embedding in &embeddings {
            if embedding.len() != dimensions {
                return Err(ChatError::Embedding(format!(
                    "embedding dimension {} != {}",
                    embedding.len(),
                    dimensions
                )));
            }
        }

        let entries = chunks
            .iter()
            .zip(embeddings)
            .map(|(text, embedding)| VectorEntry {
                text: text.clone(),
                embedding,
            })
            .collect();

        Ok(Self {
            entries,
            dimensions,
            model: embedder.model_name().to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Top-k nearest entries under cosine similarity, best-first. Equal
    /// scores keep insertion order, so repeated searches are identical.
    /// `k` is clamped to the entry count and never errors when too large.
    pub async fn search<E>(
        &self,
        embedder: &E,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, ChatError>
    where
        E: Embedder + Sync + ?Sized,
    {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut query_vectors = embedder.embed(&[query.to_string()]).await?;
        let query_vector = query_vectors.pop().ok_or_else(|| {
            ChatError::Embedding("embedding service returned no vector for the query".to_string())
        })?;

        if query_vector.len() != self.dimensions {
            return Err(ChatError::Embedding(format!(
                "query embedding dimension {} != {}",
                query_vector.len(),
                self.dimensions
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| {
                (position, cosine_similarity(&query_vector, &entry.embedding))
            })
            .collect();

        scored.sort_by(|left, right| {
            right
                .1
                .total_cmp(&left.1)
                .then_with(|| left.0.cmp(&right.0))
        });

        let k = k.max(1).min(self.entries.len());

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(position, score)| ScoredChunk {
                text: self.entries[position].text.clone(),
                score,
            })
            .collect())
    }

    /// Writes the full entry set as a versioned JSON snapshot.
    pub fn persist(&self, path: &Path) -> Result<(), ChatError> {
        let snapshot = IndexSnapshot {
            version: SNAPSHOT_VERSION,
            model: self.model.clone(),
            dimensions: self.dimensions,
            entries: self.entries.clone(),
        };

        fs::write(path, serde_json::to_string(&snapshot)?)?;
        Ok(())
    }

    /// Restores an index from [`Self::persist`] output. Search over the
    /// restored index returns the same results, in the same order, as the
    /// index that was persisted.
    pub fn load(path: &Path) -> Result<Self, ChatError> {
        let snapshot: IndexSnapshot = serde_json::from_str(&fs::read_to_string(path)?)?;

        for entry in &snapshot.entries {
            if entry.embedding.len() != snapshot.dimensions {
                return Err(ChatError::Embedding(format!(
                    "persisted entry dimension {} != {}",
                    entry.embedding.len(),
                    snapshot.dimensions
                )));
            }
        }

        Ok(Self {
            entries: snapshot.entries,
            dimensions: snapshot.dimensions,
            model: snapshot.model,
        })
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}
