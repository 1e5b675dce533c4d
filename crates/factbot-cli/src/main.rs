//! Factbot command line: chat REPL, one-shot questions, and fact ingestion.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use factbot_chat::{AnswerOutcome, QueryPipeline, QuestionAnswer, RuleBasedExtractor};
use factbot_knowledge::{
    EmbeddingProvider, HashEmbedding, KnowledgeStore, OpenAiEmbedding, SimilarityRetriever,
    SqliteStore,
};

#[derive(Parser)]
#[command(name = "factbot", about = "Factbot — embedding-indexed fact retrieval")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "factbot.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive question-answering loop
    Chat,
    /// Answer a single question and exit
    Ask {
        /// The question to answer
        question: String,
    },
    /// Load term/fact records from a JSONL file and embed the terms
    Ingest {
        /// Path to a JSONL file of {"term": ..., "fact": ...} records
        file: PathBuf,
    },
}

#[derive(Deserialize)]
struct FactbotConfig {
    #[serde(default = "default_data_dir")]
    data_dir: PathBuf,
    #[serde(default)]
    embedding: EmbeddingConfig,
    #[serde(default)]
    retrieval: RetrievalConfig,
}

impl Default for FactbotConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

#[derive(Deserialize)]
struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    provider: String,
    #[serde(default = "default_dimension")]
    dimension: usize,
    #[serde(default = "default_model")]
    model: String,
    #[serde(default = "default_base_url")]
    base_url: String,
    #[serde(default = "default_api_key_env")]
    api_key_env: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            dimension: default_dimension(),
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
        }
    }
}

#[derive(Deserialize)]
struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    top_k: usize,
    #[serde(default = "default_threshold")]
    threshold: f32,
    #[serde(default = "default_margin")]
    margin: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            threshold: default_threshold(),
            margin: default_margin(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_provider() -> String {
    "hash".to_string()
}
fn default_dimension() -> usize {
    factbot_knowledge::DEFAULT_DIMENSION
}
fn default_model() -> String {
    factbot_knowledge::embedding::DEFAULT_OPENAI_MODEL.to_string()
}
fn default_base_url() -> String {
    factbot_knowledge::embedding::DEFAULT_OPENAI_URL.to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_top_k() -> usize {
    factbot_knowledge::DEFAULT_TOP_K
}
fn default_threshold() -> f32 {
    factbot_knowledge::DEFAULT_THRESHOLD
}
fn default_margin() -> f32 {
    factbot_knowledge::DEFAULT_MARGIN
}

/// A single ingestion record: one fact attached to one term.
#[derive(Deserialize)]
struct IngestRecord {
    term: String,
    fact: String,
}

fn build_provider(config: &EmbeddingConfig) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "hash" => Ok(Arc::new(HashEmbedding::new(config.dimension))),
        "openai" => {
            let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                anyhow::anyhow!(
                    "embedding provider 'openai' requires the {} environment variable",
                    config.api_key_env
                )
            })?;
            Ok(Arc::new(OpenAiEmbedding::new(
                &config.base_url,
                &config.model,
                &api_key,
                config.dimension,
            )))
        }
        other => anyhow::bail!("unknown embedding provider '{other}' (use 'hash' or 'openai')"),
    }
}

fn open_store(config: &FactbotConfig) -> anyhow::Result<Arc<SqliteStore>> {
    std::fs::create_dir_all(&config.data_dir)?;
    let path = config.data_dir.join("knowledge.db");
    let store = SqliteStore::open_with_dimension(&path, config.embedding.dimension)?;
    Ok(Arc::new(store))
}

fn build_pipeline(config: &FactbotConfig) -> anyhow::Result<QueryPipeline> {
    let store = open_store(config)?;
    let provider = build_provider(&config.embedding)?;
    let retriever = SimilarityRetriever::new(store)
        .with_top_k(config.retrieval.top_k)
        .with_threshold(config.retrieval.threshold)
        .with_margin(config.retrieval.margin);
    Ok(QueryPipeline::new(
        Arc::new(RuleBasedExtractor::new()),
        provider,
        retriever,
    ))
}

fn render_answers(answers: &[QuestionAnswer]) {
    for answer in answers {
        match &answer.outcome {
            AnswerOutcome::Answered { primary, related } => {
                println!("For your question: '{}'", answer.question);
                println!(
                    "Here's something interesting: {} (similarity {:.2})",
                    primary.fact, primary.score
                );
                if !related.is_empty() {
                    println!("You might also find these intriguing:");
                    for fact in related {
                        println!("- {}", fact.fact);
                    }
                }
            }
            AnswerOutcome::NoConfidentMatch => {
                println!(
                    "I'm sorry, I couldn't find an answer for your question: '{}'",
                    answer.question
                );
            }
            AnswerOutcome::ProviderFailed(_) => {
                println!("I'm sorry, I couldn't process your request.");
            }
        }
    }
}

async fn run_chat(config: &FactbotConfig) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config)?;
    println!("Hello! Ask me anything from the knowledge base. Type 'exit' to quit.");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") {
            println!("Goodbye!");
            break;
        }

        let answers = pipeline.answer(input).await?;
        render_answers(&answers);
    }
    Ok(())
}

async fn run_ingest(config: &FactbotConfig, file: &Path) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let provider = build_provider(&config.embedding)?;

    let data = tokio::fs::read_to_string(file).await?;
    let mut facts_added = 0usize;
    let mut embedded: std::collections::HashSet<i64> = std::collections::HashSet::new();

    for (line_no, line) in data.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: IngestRecord = serde_json::from_str(line)
            .map_err(|e| anyhow::anyhow!("invalid record on line {}: {}", line_no + 1, e))?;

        let term_id = store.add_term(&record.term).await?;
        store.add_fact(term_id, &record.fact).await?;
        facts_added += 1;

        // One embedding per distinct term per run; a provider failure
        // leaves the term searchable later without losing the fact.
        if embedded.insert(term_id) {
            match provider.embed(&record.term).await {
                Ok(vector) => store.set_embedding(term_id, &vector).await?,
                Err(e) => {
                    warn!(term = %record.term, error = %e, "Skipping embedding");
                }
            }
        }
    }

    info!(
        facts = facts_added,
        terms = embedded.len(),
        "Ingestion complete"
    );
    println!(
        "Ingested {} fact(s) across {} term(s) from {}",
        facts_added,
        embedded.len(),
        file.display()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Missing config file falls back to defaults; a present but broken
    // file is an error.
    let config: FactbotConfig = if cli.config.exists() {
        let raw = tokio::fs::read_to_string(&cli.config).await.map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", cli.config.display(), e)
        })?;
        toml::from_str(&raw)?
    } else {
        FactbotConfig::default()
    };

    match cli.command {
        Commands::Chat => run_chat(&config).await?,
        Commands::Ask { question } => {
            let pipeline = build_pipeline(&config)?;
            let answers = pipeline.answer(&question).await?;
            render_answers(&answers);
        }
        Commands::Ingest { file } => run_ingest(&config, &file).await?,
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FactbotConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.embedding.provider, "hash");
        assert_eq!(config.embedding.dimension, 256);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.threshold, 0.5);
        assert_eq!(config.retrieval.margin, 0.2);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: FactbotConfig = toml::from_str(
            r#"
            data_dir = "/tmp/kb"

            [retrieval]
            threshold = 0.6
            "#,
        )
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/kb"));
        assert_eq!(config.retrieval.threshold, 0.6);
        assert_eq!(config.retrieval.margin, 0.2);
        assert_eq!(config.embedding.provider, "hash");
    }

    #[test]
    fn test_ingest_record_parses() {
        let record: IngestRecord = serde_json::from_str(
            r#"{"term": "Lincoln", "fact": "Lincoln signed the Emancipation Proclamation"}"#,
        )
        .unwrap();
        assert_eq!(record.term, "Lincoln");
        assert!(record.fact.starts_with("Lincoln signed"));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config = EmbeddingConfig {
            provider: "quantum".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(build_provider(&config).is_err());
    }
}
