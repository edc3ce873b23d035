//! Core identifiers and the crate-wide error type.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque key identifying one tenant's chunk collection.
///
/// The vector store partitions all chunks by tenant; every read and write is
/// scoped to a single key, so there is no cross-tenant query path. The key is
/// treated as an opaque byte string — callers decide what identity it encodes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantKey(String);

impl TenantKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Stable integer id assigned by the document registry.
pub type DocumentId = i64;

/// Builds the persisted chunk id for a document ordinal.
///
/// The `"{doc_id}-{ordinal}"` format is the only persisted string contract in
/// the pipeline; reconstruction depends on parsing the ordinal back out of it.
pub fn chunk_id(doc: DocumentId, ordinal: usize) -> String {
    format!("{doc}-{ordinal}")
}

/// Parses the ordinal suffix out of a persisted chunk id.
///
/// Returns `None` when the id does not follow the `"{doc_id}-{ordinal}"`
/// format.
pub fn parse_ordinal(id: &str) -> Option<usize> {
    let (_, suffix) = id.rsplit_once('-')?;
    suffix.parse().ok()
}

/// Error type covering every pipeline stage.
///
/// Absence (unknown document, zero search hits) is not an error: those paths
/// return `Ok(None)` or an empty `Vec`. Data-integrity anomalies found during
/// reconstruction are logged, not raised.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Caller-supplied input was empty or malformed. Not retryable.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Split configuration was unusable (e.g. overlap >= window size).
    #[error("chunking failed: {0}")]
    Chunking(String),

    /// The embedding service call failed. Retryable by the caller.
    #[error("embedding service unavailable: {0}")]
    Embedding(String),

    /// The vector store call failed. Retryable by the caller.
    #[error("vector store unavailable: {0}")]
    Store(String),

    /// The completion/summarization service call failed. Retryable.
    #[error("completion service unavailable: {0}")]
    Completion(String),

    /// The document registry call failed.
    #[error("document registry failed: {0}")]
    Registry(String),
}

impl PipelineError {
    /// Whether the caller may reasonably retry the whole operation.
    ///
    /// The pipeline itself never retries; that belongs to the orchestration
    /// layer above it.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Embedding(_) | Self::Store(_) | Self::Completion(_)
        )
    }
}
