//! Knowledge store: durable CRUD over terms, facts, and embeddings.
//!
//! The store owns three relations: terms (unique text), at most one
//! embedding per term, and deduplicated facts per term, with referential
//! integrity enforced on every write. Two backends are provided:
//! [`SqliteStore`] for durable on-disk storage and [`InMemoryStore`] for
//! tests and ephemeral use.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use factbot_core::{FactbotError, FactbotResult};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::math::l2_normalize;

/// Meta key under which the fixed embedding dimension is persisted.
const META_DIMENSION_KEY: &str = "embedding_dim";

/// Trait for knowledge storage backends.
///
/// All mutating operations commit durably before returning; a concurrent
/// reader never observes a half-written row. Absence (unknown term, no
/// facts) is an empty result, not an error.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Insert a term if absent and return its id; return the existing id
    /// if the term is already stored. Idempotent.
    async fn add_term(&self, text: &str) -> FactbotResult<i64>;

    /// Look up a term id by its text.
    async fn term_id(&self, text: &str) -> FactbotResult<Option<i64>>;

    /// Upsert the embedding for an existing term. The vector is
    /// L2-normalized at write time. Fails with `InvalidArgument` if the
    /// term does not exist or the vector length mismatches the store's
    /// fixed dimension (established by configuration or by the first
    /// embedding ever stored).
    async fn set_embedding(&self, term_id: i64, vector: &[f32]) -> FactbotResult<()>;

    /// Insert a fact for an existing term unless an identical
    /// `(term_id, text)` pair is already stored. Idempotent. Fails with
    /// `InvalidArgument` if the term does not exist.
    async fn add_fact(&self, term_id: i64, text: &str) -> FactbotResult<()>;

    /// All facts for a term in insertion order. Empty for an unknown term
    /// or a term without facts.
    async fn facts_for_term(&self, term_id: i64) -> FactbotResult<Vec<String>>;

    /// Full scan of all stored embeddings, ascending by term id.
    async fn all_embeddings(&self) -> FactbotResult<Vec<(i64, Vec<f32>)>>;

    /// The store's fixed embedding dimension, if one has been established.
    async fn dimension(&self) -> FactbotResult<Option<usize>>;
}

fn db_err(e: rusqlite::Error) -> FactbotError {
    FactbotError::Store(e.to_string())
}

/// Encode a vector as a little-endian f32 blob.
fn encode_vector(v: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(v.len() * 4);
    for x in v {
        out.extend_from_slice(&x.to_le_bytes());
    }
    out
}

/// Decode a little-endian f32 blob back into a vector.
fn decode_vector(blob: &[u8]) -> FactbotResult<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(FactbotError::Store(format!(
            "corrupt embedding blob: {} bytes",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// SQLite-backed knowledge store.
///
/// Every operation runs as a single autocommitted statement (or a
/// check-then-write under the connection lock), so each row becomes
/// visible atomically.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path. The embedding dimension
    /// is fixed by the first embedding written, or by a previously
    /// persisted value if the file already exists.
    pub fn open(path: impl AsRef<Path>) -> FactbotResult<Self> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::init(conn, None)
    }

    /// Open (or create) a store with an explicitly configured embedding
    /// dimension. Fails with `Config` if the store was already fixed at a
    /// different dimension.
    pub fn open_with_dimension(path: impl AsRef<Path>, dimension: usize) -> FactbotResult<Self> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::init(conn, Some(dimension))
    }

    /// Open a transient in-memory store. Useful for tests.
    pub fn open_in_memory() -> FactbotResult<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, dimension: Option<usize>) -> FactbotResult<Self> {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE IF NOT EXISTS terms (
                 id   INTEGER PRIMARY KEY AUTOINCREMENT,
                 term TEXT NOT NULL UNIQUE
             );
             CREATE TABLE IF NOT EXISTS embeddings (
                 term_id INTEGER PRIMARY KEY REFERENCES terms(id),
                 vector  BLOB NOT NULL
             );
             CREATE TABLE IF NOT EXISTS facts (
                 id      INTEGER PRIMARY KEY AUTOINCREMENT,
                 term_id INTEGER NOT NULL REFERENCES terms(id),
                 fact    TEXT NOT NULL,
                 UNIQUE (term_id, fact)
             );
             CREATE TABLE IF NOT EXISTS meta (
                 key   TEXT PRIMARY KEY,
                 value TEXT NOT NULL
             );",
        )
        .map_err(db_err)?;

        if let Some(dim) = dimension {
            match Self::stored_dimension(&conn)? {
                Some(existing) if existing != dim => {
                    return Err(FactbotError::Config(format!(
                        "store is fixed at dimension {existing}, cannot reopen with {dim}"
                    )));
                }
                Some(_) => {}
                None => {
                    conn.execute(
                        "INSERT INTO meta (key, value) VALUES (?1, ?2)",
                        params![META_DIMENSION_KEY, dim.to_string()],
                    )
                    .map_err(db_err)?;
                }
            }
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn stored_dimension(conn: &Connection) -> FactbotResult<Option<usize>> {
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![META_DIMENSION_KEY],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        match value {
            Some(s) => s
                .parse::<usize>()
                .map(Some)
                .map_err(|_| FactbotError::Store(format!("corrupt dimension value: {s}"))),
            None => Ok(None),
        }
    }

    fn lock(&self) -> FactbotResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| FactbotError::Store(e.to_string()))
    }

    fn term_exists(conn: &Connection, term_id: i64) -> FactbotResult<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT id FROM terms WHERE id = ?1",
                params![term_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl KnowledgeStore for SqliteStore {
    async fn add_term(&self, text: &str) -> FactbotResult<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO terms (term) VALUES (?1)",
            params![text],
        )
        .map_err(db_err)?;
        let id: i64 = conn
            .query_row(
                "SELECT id FROM terms WHERE term = ?1",
                params![text],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(id)
    }

    async fn term_id(&self, text: &str) -> FactbotResult<Option<i64>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id FROM terms WHERE term = ?1",
            params![text],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_err)
    }

    async fn set_embedding(&self, term_id: i64, vector: &[f32]) -> FactbotResult<()> {
        let conn = self.lock()?;
        if !Self::term_exists(&conn, term_id)? {
            return Err(FactbotError::InvalidArgument(format!(
                "no such term: {term_id}"
            )));
        }

        match Self::stored_dimension(&conn)? {
            Some(dim) if dim != vector.len() => {
                return Err(FactbotError::InvalidArgument(format!(
                    "embedding dimension mismatch: expected {dim}, got {}",
                    vector.len()
                )));
            }
            Some(_) => {}
            None => {
                // First embedding fixes the store dimension.
                conn.execute(
                    "INSERT INTO meta (key, value) VALUES (?1, ?2)",
                    params![META_DIMENSION_KEY, vector.len().to_string()],
                )
                .map_err(db_err)?;
            }
        }

        let mut normalized = vector.to_vec();
        l2_normalize(&mut normalized);
        conn.execute(
            "INSERT INTO embeddings (term_id, vector) VALUES (?1, ?2)
             ON CONFLICT (term_id) DO UPDATE SET vector = excluded.vector",
            params![term_id, encode_vector(&normalized)],
        )
        .map_err(db_err)?;
        debug!(term_id, dim = vector.len(), "Embedding stored");
        Ok(())
    }

    async fn add_fact(&self, term_id: i64, text: &str) -> FactbotResult<()> {
        let conn = self.lock()?;
        if !Self::term_exists(&conn, term_id)? {
            return Err(FactbotError::InvalidArgument(format!(
                "no such term: {term_id}"
            )));
        }
        conn.execute(
            "INSERT OR IGNORE INTO facts (term_id, fact) VALUES (?1, ?2)",
            params![term_id, text],
        )
        .map_err(db_err)?;
        Ok(())
    }

    async fn facts_for_term(&self, term_id: i64) -> FactbotResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT fact FROM facts WHERE term_id = ?1 ORDER BY id")
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![term_id], |row| row.get(0))
            .map_err(db_err)?;
        let mut facts = Vec::new();
        for row in rows {
            facts.push(row.map_err(db_err)?);
        }
        Ok(facts)
    }

    async fn all_embeddings(&self) -> FactbotResult<Vec<(i64, Vec<f32>)>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT term_id, vector FROM embeddings ORDER BY term_id")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
            })
            .map_err(db_err)?;
        let mut embeddings = Vec::new();
        for row in rows {
            let (term_id, blob) = row.map_err(db_err)?;
            embeddings.push((term_id, decode_vector(&blob)?));
        }
        Ok(embeddings)
    }

    async fn dimension(&self) -> FactbotResult<Option<usize>> {
        let conn = self.lock()?;
        Self::stored_dimension(&conn)
    }
}

/// In-memory knowledge store with the same semantics as [`SqliteStore`].
///
/// Nothing survives the process; intended for tests and ephemeral runs.
pub struct InMemoryStore {
    inner: tokio::sync::RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    next_term_id: i64,
    ids_by_term: HashMap<String, i64>,
    terms: HashMap<i64, String>,
    embeddings: HashMap<i64, Vec<f32>>,
    facts: HashMap<i64, Vec<String>>,
    dimension: Option<usize>,
}

impl InMemoryStore {
    /// Create an empty store whose dimension is fixed by the first
    /// embedding written.
    pub fn new() -> Self {
        Self {
            inner: tokio::sync::RwLock::new(Inner {
                next_term_id: 1,
                ..Inner::default()
            }),
        }
    }

    /// Create an empty store with an explicitly configured dimension.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            inner: tokio::sync::RwLock::new(Inner {
                next_term_id: 1,
                dimension: Some(dimension),
                ..Inner::default()
            }),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    async fn add_term(&self, text: &str) -> FactbotResult<i64> {
        let mut inner = self.inner.write().await;
        if let Some(&id) = inner.ids_by_term.get(text) {
            return Ok(id);
        }
        let id = inner.next_term_id;
        inner.next_term_id += 1;
        inner.ids_by_term.insert(text.to_string(), id);
        inner.terms.insert(id, text.to_string());
        Ok(id)
    }

    async fn term_id(&self, text: &str) -> FactbotResult<Option<i64>> {
        let inner = self.inner.read().await;
        Ok(inner.ids_by_term.get(text).copied())
    }

    async fn set_embedding(&self, term_id: i64, vector: &[f32]) -> FactbotResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.terms.contains_key(&term_id) {
            return Err(FactbotError::InvalidArgument(format!(
                "no such term: {term_id}"
            )));
        }
        match inner.dimension {
            Some(dim) if dim != vector.len() => {
                return Err(FactbotError::InvalidArgument(format!(
                    "embedding dimension mismatch: expected {dim}, got {}",
                    vector.len()
                )));
            }
            Some(_) => {}
            None => inner.dimension = Some(vector.len()),
        }
        let mut normalized = vector.to_vec();
        l2_normalize(&mut normalized);
        inner.embeddings.insert(term_id, normalized);
        Ok(())
    }

    async fn add_fact(&self, term_id: i64, text: &str) -> FactbotResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.terms.contains_key(&term_id) {
            return Err(FactbotError::InvalidArgument(format!(
                "no such term: {term_id}"
            )));
        }
        let facts = inner.facts.entry(term_id).or_default();
        if !facts.iter().any(|f| f == text) {
            facts.push(text.to_string());
        }
        Ok(())
    }

    async fn facts_for_term(&self, term_id: i64) -> FactbotResult<Vec<String>> {
        let inner = self.inner.read().await;
        Ok(inner.facts.get(&term_id).cloned().unwrap_or_default())
    }

    async fn all_embeddings(&self) -> FactbotResult<Vec<(i64, Vec<f32>)>> {
        let inner = self.inner.read().await;
        let mut embeddings: Vec<(i64, Vec<f32>)> = inner
            .embeddings
            .iter()
            .map(|(&id, v)| (id, v.clone()))
            .collect();
        embeddings.sort_by_key(|&(id, _)| id);
        Ok(embeddings)
    }

    async fn dimension(&self) -> FactbotResult<Option<usize>> {
        let inner = self.inner.read().await;
        Ok(inner.dimension)
    }
}
