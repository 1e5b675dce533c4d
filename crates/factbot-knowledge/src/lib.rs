//! Embedding-indexed knowledge store with cosine-similarity retrieval.
//!
//! Provides the persistent term/fact/embedding data model and the
//! nearest-neighbor retrieval that maps a query vector to ranked facts.
//!
//! # Main types
//!
//! - [`KnowledgeStore`] — Trait for term/fact/embedding storage backends.
//! - [`SqliteStore`] — Durable SQLite-backed store.
//! - [`InMemoryStore`] — In-memory store for tests and ephemeral use.
//! - [`EmbeddingProvider`] — Trait for text-to-vector providers.
//! - [`HashEmbedding`] — Deterministic local provider (offline, tests).
//! - [`OpenAiEmbedding`] — OpenAI-compatible HTTP provider.
//! - [`SimilarityRetriever`] — Threshold-gated brute-force cosine retrieval.

/// Embedding provider trait and implementations.
pub mod embedding;
/// Vector math shared by the store and retriever.
pub mod math;
/// Threshold-gated similarity retrieval.
pub mod retriever;
/// Knowledge store trait and backends.
pub mod store;

pub use embedding::{EmbeddingProvider, HashEmbedding, OpenAiEmbedding, DEFAULT_DIMENSION};
pub use retriever::{SimilarityRetriever, DEFAULT_MARGIN, DEFAULT_THRESHOLD, DEFAULT_TOP_K};
pub use store::{InMemoryStore, KnowledgeStore, SqliteStore};
