//! Vector storage backends for chunk records.
//!
//! The [`VectorStore`] trait abstracts over storage implementations so the
//! pipeline components stay testable with fakes. Collections are partitioned
//! by [`TenantKey`] and created lazily on first use; no operation can read
//! across tenants.
//!
//! Backends:
//! - [`memory::InMemoryVectorStore`] — in-process maps, also the test fake.
//! - [`sqlite::SqliteChunkStore`] — SQLite with cosine search via `sqlite-vec`.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{DocumentId, PipelineError, TenantKey, chunk_id, parse_ordinal};

pub use memory::InMemoryVectorStore;
pub use sqlite::SqliteChunkStore;

/// One stored chunk: a bounded text segment tied back to its source document.
///
/// The persisted id is `"{doc_id}-{ordinal}"`; the ordinal lives only in the
/// id suffix, exactly as it is persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Persisted identifier, `"{doc_id}-{ordinal}"`.
    pub id: String,
    /// Source document this chunk was split from.
    pub doc_id: DocumentId,
    /// The chunk text, verbatim from the splitter (overlap included).
    pub content: String,
    /// When the chunk was written.
    pub inserted_at: DateTime<Utc>,
    /// Embedding vector, if computed.
    pub embedding: Option<Vec<f32>>,
}

impl ChunkRecord {
    pub fn new(doc_id: DocumentId, ordinal: usize, content: impl Into<String>) -> Self {
        Self {
            id: chunk_id(doc_id, ordinal),
            doc_id,
            content: content.into(),
            inserted_at: Utc::now(),
            embedding: None,
        }
    }

    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    #[must_use]
    pub fn with_inserted_at(mut self, at: DateTime<Utc>) -> Self {
        self.inserted_at = at;
        self
    }

    /// Ordinal parsed from the id suffix; `None` when the id is malformed.
    pub fn ordinal(&self) -> Option<usize> {
        parse_ordinal(&self.id)
    }
}

/// A search hit: the chunk plus its cosine similarity to the query vector
/// (higher is closer).
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredChunk {
    pub record: ChunkRecord,
    pub score: f32,
}

/// Unified contract for chunk storage backends.
///
/// Inserts use upsert semantics on the chunk id, which is what makes an
/// identical re-ingest ordinal-stable. Reads on a tenant with no collection
/// yet return empty results, never an error.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert (or replace, by id) a batch of chunk records.
    async fn insert_chunks(
        &self,
        tenant: &TenantKey,
        chunks: Vec<ChunkRecord>,
    ) -> Result<(), PipelineError>;

    /// All chunks whose source document matches, in unspecified order.
    async fn chunks_by_document(
        &self,
        tenant: &TenantKey,
        doc: DocumentId,
    ) -> Result<Vec<ChunkRecord>, PipelineError>;

    /// Nearest neighbors of `query` by cosine similarity, best first,
    /// at most `top_k` results. Chunks without embeddings are not searchable.
    async fn search_similar(
        &self,
        tenant: &TenantKey,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, PipelineError>;

    /// Delete exactly the given ids; returns how many existed.
    async fn delete_chunks(
        &self,
        tenant: &TenantKey,
        ids: &[String],
    ) -> Result<usize, PipelineError>;

    /// Total chunks in the tenant's collection.
    async fn count(&self, tenant: &TenantKey) -> Result<usize, PipelineError>;
}

/// Cosine similarity; zero when either vector has zero norm or the
/// dimensions disagree.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
