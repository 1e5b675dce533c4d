//! Question-answering boundary around the knowledge core.
//!
//! Thin glue between raw user text and the embedding-indexed store:
//! extract questions, embed them, retrieve ranked facts, and report
//! per-question outcomes as values.
//!
//! # Main types
//!
//! - [`QuestionExtractor`] — Trait for finding questions in user text.
//! - [`RuleBasedExtractor`] — Sentences ending in `?`.
//! - [`QueryPipeline`] — extract → embed → retrieve, sequential per question.
//! - [`AnswerOutcome`] — Answered / no confident match / provider failed.

/// Question extraction from raw user input.
pub mod extractor;
/// The embed-retrieve answer pipeline.
pub mod pipeline;

pub use extractor::{QuestionExtractor, RuleBasedExtractor};
pub use pipeline::{AnswerOutcome, QueryPipeline, QuestionAnswer};
