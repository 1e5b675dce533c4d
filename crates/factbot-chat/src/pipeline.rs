//! The embed-retrieve answer pipeline.
//!
//! Consumes raw user text, splits it into questions, embeds each question
//! via the injected provider, and runs similarity retrieval. Per-question
//! failures and empty results are represented as outcome values so
//! callers branch on content, not on control flow.

use std::sync::Arc;

use factbot_core::{FactbotError, FactbotResult, RetrievedFact};
use factbot_knowledge::{EmbeddingProvider, SimilarityRetriever};
use tracing::{debug, warn};

use crate::extractor::QuestionExtractor;

/// The outcome of answering a single question.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    /// Retrieval found a confident primary fact, possibly with related
    /// suggestions from lower-ranked terms.
    Answered {
        /// The best-matching fact.
        primary: RetrievedFact,
        /// Further facts that cleared the relaxed threshold.
        related: Vec<RetrievedFact>,
    },
    /// Retrieval succeeded but nothing cleared the confidence threshold.
    NoConfidentMatch,
    /// The embedding provider failed for this question; retrieval was
    /// not attempted.
    ProviderFailed(String),
}

/// One question extracted from the input, paired with its outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionAnswer {
    /// The question as extracted from the user input.
    pub question: String,
    /// What answering it produced.
    pub outcome: AnswerOutcome,
}

/// Sequential question-answering pipeline over injected collaborators.
pub struct QueryPipeline {
    extractor: Arc<dyn QuestionExtractor>,
    provider: Arc<dyn EmbeddingProvider>,
    retriever: SimilarityRetriever,
}

impl QueryPipeline {
    /// Create a pipeline from its collaborators.
    pub fn new(
        extractor: Arc<dyn QuestionExtractor>,
        provider: Arc<dyn EmbeddingProvider>,
        retriever: SimilarityRetriever,
    ) -> Self {
        Self {
            extractor,
            provider,
            retriever,
        }
    }

    /// Answer every question found in `input`, one outcome per question.
    ///
    /// Input without any extractable question is treated as a single
    /// question. Provider failures are per-question outcomes; store and
    /// retriever failures abort the whole call.
    pub async fn answer(&self, input: &str) -> FactbotResult<Vec<QuestionAnswer>> {
        let mut questions = self.extractor.questions(input);
        if questions.is_empty() {
            let whole = input.trim();
            if whole.is_empty() {
                return Ok(Vec::new());
            }
            questions.push(whole.to_string());
        }
        debug!(count = questions.len(), "Questions extracted");

        let mut answers = Vec::with_capacity(questions.len());
        for question in questions {
            let vector = match self.provider.embed(&question).await {
                Ok(v) => v,
                Err(FactbotError::Provider(msg)) => {
                    warn!(question = %question, error = %msg, "Embedding provider failed");
                    answers.push(QuestionAnswer {
                        question,
                        outcome: AnswerOutcome::ProviderFailed(msg),
                    });
                    continue;
                }
                Err(other) => return Err(other),
            };

            let results = self.retriever.retrieve(&vector).await?;
            let outcome = match results.split_first() {
                None => AnswerOutcome::NoConfidentMatch,
                Some((primary, related)) => AnswerOutcome::Answered {
                    primary: primary.clone(),
                    related: related.to_vec(),
                },
            };
            answers.push(QuestionAnswer { question, outcome });
        }
        Ok(answers)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::extractor::RuleBasedExtractor;
    use async_trait::async_trait;
    use factbot_knowledge::{InMemoryStore, KnowledgeStore};

    /// Provider that returns a fixed vector per known text and fails on
    /// anything else.
    struct FakeProvider {
        known: Vec<(&'static str, Vec<f32>)>,
    }

    #[async_trait]
    impl EmbeddingProvider for FakeProvider {
        async fn embed(&self, text: &str) -> FactbotResult<Vec<f32>> {
            self.known
                .iter()
                .find(|(t, _)| *t == text)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| FactbotError::Provider("unknown text".to_string()))
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    async fn seeded_store() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        let id = store.add_term("Lincoln").await.unwrap();
        store.set_embedding(id, &[1.0, 0.0]).await.unwrap();
        store
            .add_fact(id, "Lincoln signed the Emancipation Proclamation")
            .await
            .unwrap();
        store
    }

    fn pipeline(store: Arc<InMemoryStore>, provider: FakeProvider) -> QueryPipeline {
        QueryPipeline::new(
            Arc::new(RuleBasedExtractor::new()),
            Arc::new(provider),
            SimilarityRetriever::new(store),
        )
    }

    #[tokio::test]
    async fn test_answers_a_confident_question() {
        let store = seeded_store().await;
        let provider = FakeProvider {
            known: vec![("Who was Lincoln?", vec![0.95, 0.312249900])],
        };

        let answers = pipeline(store, provider)
            .answer("Who was Lincoln?")
            .await
            .unwrap();
        assert_eq!(answers.len(), 1);
        match &answers[0].outcome {
            AnswerOutcome::Answered { primary, related } => {
                assert_eq!(primary.fact, "Lincoln signed the Emancipation Proclamation");
                assert!(related.is_empty());
            }
            other => panic!("expected Answered, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_provider_failure_is_an_outcome_not_an_error() {
        let store = seeded_store().await;
        let provider = FakeProvider { known: vec![] };

        let answers = pipeline(store, provider)
            .answer("Who was Lincoln?")
            .await
            .unwrap();
        assert_eq!(answers.len(), 1);
        assert!(matches!(
            answers[0].outcome,
            AnswerOutcome::ProviderFailed(_)
        ));
    }

    #[tokio::test]
    async fn test_provider_failure_does_not_stop_later_questions() {
        let store = seeded_store().await;
        let provider = FakeProvider {
            known: vec![("When was he born?", vec![0.9, (1.0f32 - 0.81).sqrt()])],
        };

        let answers = pipeline(store, provider)
            .answer("Who was Lincoln? When was he born?")
            .await
            .unwrap();
        assert_eq!(answers.len(), 2);
        assert!(matches!(
            answers[0].outcome,
            AnswerOutcome::ProviderFailed(_)
        ));
        assert!(matches!(answers[1].outcome, AnswerOutcome::Answered { .. }));
    }

    #[tokio::test]
    async fn test_whole_input_used_when_no_question_found() {
        let store = seeded_store().await;
        let provider = FakeProvider {
            known: vec![("tell me about Lincoln", vec![1.0, 0.0])],
        };

        let answers = pipeline(store, provider)
            .answer("tell me about Lincoln")
            .await
            .unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].question, "tell me about Lincoln");
        assert!(matches!(answers[0].outcome, AnswerOutcome::Answered { .. }));
    }

    #[tokio::test]
    async fn test_weak_match_reports_no_confident_match() {
        let store = seeded_store().await;
        // cosine 0.4 to the stored embedding: below the 0.5 threshold
        let provider = FakeProvider {
            known: vec![("Who invented pizza?", vec![0.4, (1.0f32 - 0.16).sqrt()])],
        };

        let answers = pipeline(store, provider)
            .answer("Who invented pizza?")
            .await
            .unwrap();
        assert_eq!(answers[0].outcome, AnswerOutcome::NoConfidentMatch);
    }

    #[tokio::test]
    async fn test_blank_input_yields_no_answers() {
        let store = seeded_store().await;
        let provider = FakeProvider { known: vec![] };

        let answers = pipeline(store, provider).answer("   ").await.unwrap();
        assert!(answers.is_empty());
    }
}
