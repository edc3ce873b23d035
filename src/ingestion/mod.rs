//! Ingestion: raw text in, embedded chunk batch committed to the store.
//!
//! The pipeline splits with the storage profile, embeds every segment through
//! a bounded concurrent stream (ordinals are assigned before dispatch, so
//! completion order never matters), accumulates the full batch, and commits
//! it with a single store call. Nothing is written until every segment has an
//! embedding, so a failed call leaves no partial chunk set behind.

use std::sync::Arc;

use chrono::Utc;
use futures_util::{StreamExt, TryStreamExt, stream};
use tracing::info;

use crate::chunking::{SplitConfig, split};
use crate::embeddings::EmbeddingProvider;
use crate::stores::{ChunkRecord, VectorStore};
use crate::types::{DocumentId, PipelineError, TenantKey};

/// Default number of embedding calls in flight per ingest.
pub const DEFAULT_EMBED_CONCURRENCY: usize = 8;

/// Orchestrates split → embed → commit for one document at a time.
pub struct IngestionPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    config: SplitConfig,
    concurrency: usize,
}

impl IngestionPipeline {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            config: SplitConfig::storage(),
            concurrency: DEFAULT_EMBED_CONCURRENCY,
        }
    }

    /// Overrides the storage split profile. The overlap width must match the
    /// width later used for reconstruction.
    #[must_use]
    pub fn with_config(mut self, config: SplitConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Split profile in effect; reconstruction borrows its overlap width.
    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Ingests one document's raw text into the tenant's collection.
    ///
    /// Returns the number of chunks written. Empty input is a
    /// [`PipelineError::Validation`]; any embedding or store failure aborts
    /// the whole call with nothing committed. Re-running with identical text
    /// produces identical ids and safely overwrites (ordinal-stable retry).
    pub async fn ingest(
        &self,
        tenant: &TenantKey,
        doc: DocumentId,
        raw_text: &str,
    ) -> Result<usize, PipelineError> {
        if raw_text.trim().is_empty() {
            return Err(PipelineError::Validation(
                "document text is empty, nothing to index".into(),
            ));
        }
        self.config.validate()?;

        let segments = split(raw_text, &self.config);
        if segments.is_empty() {
            return Ok(0);
        }

        // Ordered, bounded-concurrency embedding: the stream yields results
        // in segment order regardless of completion order.
        let embeddings: Vec<Vec<f32>> =
            stream::iter(segments.iter().map(|segment| self.embedder.embed(segment)))
                .buffered(self.concurrency)
                .try_collect()
                .await?;

        let now = Utc::now();
        let records: Vec<ChunkRecord> = segments
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(ordinal, (content, embedding))| {
                ChunkRecord::new(doc, ordinal, content)
                    .with_inserted_at(now)
                    .with_embedding(embedding)
            })
            .collect();
        let written = records.len();

        self.store.insert_chunks(tenant, records).await?;
        info!(
            doc,
            chunks = written,
            embedder = self.embedder.name(),
            "document ingested"
        );
        Ok(written)
    }
}
