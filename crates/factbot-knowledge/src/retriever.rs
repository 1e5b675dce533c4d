//! Similarity retrieval: rank stored terms against a query vector and
//! surface their facts.
//!
//! The retriever is a deliberate brute-force scan, O(N·D) per query over
//! N stored terms of dimension D. That keeps it auditable and is fast
//! enough for knowledge bases up to tens of thousands of terms.

use std::sync::Arc;

use factbot_core::{FactbotError, FactbotResult, RetrievedFact};
use tracing::debug;

use crate::math::cosine_similarity;
use crate::store::KnowledgeStore;

/// Default number of candidate terms considered per query.
pub const DEFAULT_TOP_K: usize = 5;

/// Default similarity floor for the primary answer.
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Default relaxation applied to secondary candidates.
pub const DEFAULT_MARGIN: f32 = 0.2;

/// Ranks stored embeddings by cosine similarity to a query vector and
/// returns the facts of the best-matching terms.
///
/// Cosine similarity over generic sentence embeddings is noisy at low
/// scores, so results pass a two-tier cutoff: the best candidate must
/// clear `threshold` for anything to be returned at all, and secondary
/// candidates must clear `threshold - margin` to be included as
/// suggestions. An empty result means "no confident answer", never an
/// error.
pub struct SimilarityRetriever {
    store: Arc<dyn KnowledgeStore>,
    top_k: usize,
    threshold: f32,
    margin: f32,
}

impl SimilarityRetriever {
    /// Create a retriever with default top_k=5, threshold=0.5, margin=0.2.
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self {
            store,
            top_k: DEFAULT_TOP_K,
            threshold: DEFAULT_THRESHOLD,
            margin: DEFAULT_MARGIN,
        }
    }

    /// Set the number of candidate terms considered. Chainable.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Set the similarity floor for the primary answer. Chainable.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the relaxation for secondary candidates. Chainable.
    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin.max(0.0);
        self
    }

    /// Rank all stored embeddings against `query` and return one entry
    /// per fact of the surviving candidates.
    ///
    /// Fails with `InvalidArgument` if the query length mismatches the
    /// store's fixed dimension. Returns an empty sequence when the store
    /// holds no embeddings or no candidate clears the threshold.
    pub async fn retrieve(&self, query: &[f32]) -> FactbotResult<Vec<RetrievedFact>> {
        if let Some(dim) = self.store.dimension().await? {
            if query.len() != dim {
                return Err(FactbotError::InvalidArgument(format!(
                    "query dimension mismatch: expected {dim}, got {}",
                    query.len()
                )));
            }
        }

        let embeddings = self.store.all_embeddings().await?;
        if embeddings.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(i64, f32)> = embeddings
            .iter()
            .map(|(term_id, vector)| (*term_id, cosine_similarity(query, vector)))
            .collect();

        // Descending similarity; ties broken by ascending term id so
        // repeated calls return identical orderings.
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(self.top_k);

        let best = scored[0].1;
        if best < self.threshold {
            debug!(
                best,
                threshold = self.threshold,
                "Best candidate below confidence threshold"
            );
            return Ok(Vec::new());
        }

        let secondary_floor = self.threshold - self.margin;
        let mut results = Vec::new();
        for (rank, (term_id, score)) in scored.into_iter().enumerate() {
            if rank > 0 && score < secondary_floor {
                continue;
            }
            for fact in self.store.facts_for_term(term_id).await? {
                results.push(RetrievedFact::new(term_id, fact, score));
            }
        }

        debug!(count = results.len(), best, "Retrieval complete");
        Ok(results)
    }
}
