//! Retrieval: verbatim by-document fetches, semantic queries, and re-chunking
//! hit sets into model-sized context windows.

use std::sync::Arc;

use tracing::debug;

use crate::chunking::{SplitConfig, split};
use crate::embeddings::EmbeddingProvider;
use crate::stores::{ChunkRecord, ScoredChunk, VectorStore};
use crate::types::{DocumentId, PipelineError, TenantKey};

/// Serves chunk sets to downstream consumers.
///
/// None of the retrieval paths treat "zero hits" as an error: absent
/// documents yield empty vectors or `None`, and the caller decides whether
/// that matters.
pub struct RetrievalEngine {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    context_config: SplitConfig,
}

impl RetrievalEngine {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            embedder,
            context_config: SplitConfig::context(),
        }
    }

    /// Overrides the context-window profile used by
    /// [`RetrievalEngine::context_windows`].
    #[must_use]
    pub fn with_context_config(mut self, config: SplitConfig) -> Self {
        self.context_config = config;
        self
    }

    /// All chunks of one document, verbatim (overlaps intact), sorted by
    /// ordinal. Downstream consumers that re-split the text only need length
    /// control, not overlap trimming.
    pub async fn document_chunks(
        &self,
        tenant: &TenantKey,
        doc: DocumentId,
    ) -> Result<Vec<ChunkRecord>, PipelineError> {
        let mut chunks = self.store.chunks_by_document(tenant, doc).await?;
        chunks.sort_by_key(|record| (record.ordinal().unwrap_or(usize::MAX), record.inserted_at));
        Ok(chunks)
    }

    /// Embeds the query and returns the `top_k` nearest chunks with their
    /// cosine similarity scores, best first. Zero hits is an empty vector.
    pub async fn search(
        &self,
        tenant: &TenantKey,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, PipelineError> {
        if query.trim().is_empty() {
            return Err(PipelineError::Validation("search query is empty".into()));
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let embedding = self.embedder.embed(query).await?;
        let hits = self.store.search_similar(tenant, &embedding, top_k).await?;
        debug!(hits = hits.len(), top_k, "semantic search completed");
        Ok(hits)
    }

    /// Concatenates a chunk set and re-splits it with the context profile
    /// (large windows, zero overlap), ready for one model call per window.
    pub fn context_windows(&self, chunks: &[ChunkRecord]) -> Vec<String> {
        if chunks.is_empty() {
            return Vec::new();
        }
        let joined = chunks
            .iter()
            .map(|record| record.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        split(&joined, &self.context_config)
    }

    /// Context windows for one whole document; `None` when it has no chunks.
    pub async fn document_context(
        &self,
        tenant: &TenantKey,
        doc: DocumentId,
    ) -> Result<Option<Vec<String>>, PipelineError> {
        let chunks = self.document_chunks(tenant, doc).await?;
        if chunks.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.context_windows(&chunks)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockEmbeddingProvider;
    use crate::ingestion::IngestionPipeline;
    use crate::stores::InMemoryVectorStore;

    fn engine(store: Arc<InMemoryVectorStore>) -> RetrievalEngine {
        RetrievalEngine::new(store, Arc::new(MockEmbeddingProvider::new()))
    }

    #[tokio::test]
    async fn document_chunks_come_back_in_ordinal_order() {
        let store = Arc::new(InMemoryVectorStore::new());
        store
            .insert_chunks(
                &TenantKey::new("alice"),
                vec![
                    ChunkRecord::new(1, 2, "third"),
                    ChunkRecord::new(1, 0, "first"),
                    ChunkRecord::new(1, 1, "second"),
                ],
            )
            .await
            .unwrap();

        let chunks = engine(store)
            .document_chunks(&TenantKey::new("alice"), 1)
            .await
            .unwrap();
        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn zero_hits_is_an_empty_vector_not_an_error() {
        let store = Arc::new(InMemoryVectorStore::new());
        let hits = engine(store)
            .search(&TenantKey::new("alice"), "anything at all", 5)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let store = Arc::new(InMemoryVectorStore::new());
        let err = engine(store)
            .search(&TenantKey::new("alice"), "  ", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[tokio::test]
    async fn search_finds_the_matching_chunk() {
        let store = Arc::new(InMemoryVectorStore::new());
        let tenant = TenantKey::new("alice");
        let embedder = MockEmbeddingProvider::new();
        let pipeline = IngestionPipeline::new(
            Arc::new(embedder.clone()),
            Arc::clone(&store) as Arc<dyn VectorStore>,
        );
        pipeline
            .ingest(&tenant, 1, "Photosynthesis converts light into chemical energy.")
            .await
            .unwrap();

        let engine = RetrievalEngine::new(Arc::clone(&store) as Arc<dyn VectorStore>, Arc::new(embedder));
        // The mock embedder maps identical text to identical vectors, so the
        // exact chunk text is its own nearest neighbor with similarity 1.
        let hits = engine
            .search(
                &tenant,
                "Photosynthesis converts light into chemical energy.",
                1,
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!((hits[0].score - 1.0).abs() < 1e-4, "got {}", hits[0].score);
    }

    #[tokio::test]
    async fn context_windows_respect_the_context_profile() {
        let store = Arc::new(InMemoryVectorStore::new());
        let engine = engine(store).with_context_config(SplitConfig::new(50, 0).unwrap());

        let chunks = vec![
            ChunkRecord::new(1, 0, "A first stored chunk with some content in it."),
            ChunkRecord::new(1, 1, "A second stored chunk, also fairly wordy."),
            ChunkRecord::new(1, 2, "And a third one to push past the window size."),
        ];
        let windows = engine.context_windows(&chunks);
        assert!(windows.len() > 1);
        for window in &windows {
            assert!(window.chars().count() <= 50);
        }
    }

    #[tokio::test]
    async fn document_context_for_missing_document_is_none() {
        let store = Arc::new(InMemoryVectorStore::new());
        let windows = engine(store)
            .document_context(&TenantKey::new("alice"), 404)
            .await
            .unwrap();
        assert!(windows.is_none());
    }
}
