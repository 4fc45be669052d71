//! In-memory vector index over embedded text chunks.

use tracing::debug;

use crate::ai::{self, AiConfig};
use crate::error::PlotlineError;

/// Texts sent per embedding request.
const EMBED_BATCH: usize = 1000;

#[derive(Debug, Default)]
pub struct VectorStore {
    entries: Vec<(String, Vec<f32>)>,
}

impl VectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Embed `texts` and index them in order.
    pub async fn from_texts(cfg: &AiConfig, texts: Vec<String>) -> Result<Self, PlotlineError> {
        let mut store = Self::new();
        for batch in texts.chunks(EMBED_BATCH) {
            let r = ai::get_embeddings(cfg, batch).await?;
            if let Some(u) = &r.usage {
                debug!(texts = batch.len(), tokens = u.total_tokens, "embedded batch");
            }
            for (text, emb) in batch.iter().zip(r.embeddings) {
                store.insert(text.clone(), emb);
            }
        }
        Ok(store)
    }

    pub fn insert(&mut self, text: String, embedding: Vec<f32>) {
        self.entries.push((text, embedding));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Brute-force cosine search. Returns up to `k` texts, best first;
    /// equal scores keep insertion order.
    pub fn search(&self, query_emb: &[f32], k: usize) -> Vec<(&str, f64)> {
        let mut scored: Vec<(&str, f64)> = self
            .entries
            .iter()
            .map(|(text, emb)| (text.as_str(), ai::cosine_similarity(query_emb, emb)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }
}
