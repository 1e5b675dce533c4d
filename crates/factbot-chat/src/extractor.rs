//! Question extraction from raw user input.

use regex::Regex;

/// Trait for splitting raw user text into the questions it contains.
///
/// Implementations are injected into the pipeline so tests can substitute
/// deterministic fakes for NLP-backed extractors.
pub trait QuestionExtractor: Send + Sync {
    /// All questions found in `text`, in order of appearance. May be empty.
    fn questions(&self, text: &str) -> Vec<String>;
}

/// Rule-based extractor: a question is a sentence ending in `?`.
pub struct RuleBasedExtractor {
    question: Regex,
}

impl RuleBasedExtractor {
    /// Create the extractor.
    pub fn new() -> Self {
        // A run of non-terminator characters followed by a question mark.
        #[allow(clippy::expect_used)]
        let question = Regex::new(r"[^.!?]+\?").expect("static question pattern");
        Self { question }
    }
}

impl Default for RuleBasedExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl QuestionExtractor for RuleBasedExtractor {
    fn questions(&self, text: &str) -> Vec<String> {
        self.question
            .find_iter(text)
            .map(|m| m.as_str().trim().to_string())
            .filter(|q| q.len() > 1)
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_single_question() {
        let ex = RuleBasedExtractor::new();
        assert_eq!(ex.questions("Who was Lincoln?"), vec!["Who was Lincoln?"]);
    }

    #[test]
    fn test_extracts_multiple_questions() {
        let ex = RuleBasedExtractor::new();
        let qs = ex.questions("Hello there. Who was Lincoln? And when was he born?");
        assert_eq!(qs, vec!["Who was Lincoln?", "And when was he born?"]);
    }

    #[test]
    fn test_ignores_statements() {
        let ex = RuleBasedExtractor::new();
        assert!(ex.questions("Lincoln was the 16th president.").is_empty());
    }

    #[test]
    fn test_ignores_bare_question_mark() {
        let ex = RuleBasedExtractor::new();
        assert!(ex.questions("?").is_empty());
    }

    #[test]
    fn test_empty_input() {
        let ex = RuleBasedExtractor::new();
        assert!(ex.questions("").is_empty());
    }
}
