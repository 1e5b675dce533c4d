//! Core types and error definitions for the Factbot knowledge engine.
//!
//! This crate provides the foundational types shared across all Factbot
//! crates: the unified error enum, a result alias, and the retrieved-fact
//! value returned by similarity retrieval.
//!
//! # Main types
//!
//! - [`FactbotError`] — Unified error enum for all Factbot subsystems.
//! - [`FactbotResult`] — Convenience alias for `Result<T, FactbotError>`.
//! - [`RetrievedFact`] — A fact surfaced by retrieval, with its similarity score.

use serde::{Deserialize, Serialize};

// --- Error types ---

/// Top-level error type for the Factbot knowledge engine.
///
/// Empty retrieval results and low-confidence matches are never errors;
/// they are represented in return values so callers branch on content.
#[derive(Debug, thiserror::Error)]
pub enum FactbotError {
    /// Underlying persistence I/O failure. Not retried by the core.
    #[error("Store error: {0}")]
    Store(String),

    /// Caller error: vector dimension mismatch or reference to a
    /// nonexistent term. Never silently corrected.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The external embedding provider failed (rate limit, network,
    /// malformed input or response).
    #[error("Provider error: {0}")]
    Provider(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`FactbotError`].
pub type FactbotResult<T> = Result<T, FactbotError>;

// --- Retrieval output ---

/// A single fact surfaced by similarity retrieval.
///
/// A term with N facts contributes N values, all carrying the term's
/// similarity score against the query vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedFact {
    /// Identifier of the term this fact is attached to.
    pub term_id: i64,
    /// The fact text, verbatim as stored.
    pub fact: String,
    /// Cosine similarity of the owning term's embedding to the query.
    pub score: f32,
}

impl RetrievedFact {
    /// Creates a retrieved fact.
    pub fn new(term_id: i64, fact: impl Into<String>, score: f32) -> Self {
        Self {
            term_id,
            fact: fact.into(),
            score,
        }
    }
}
