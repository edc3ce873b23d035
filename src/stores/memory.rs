//! In-memory vector store backend.
//!
//! Keeps every tenant collection in a process-local map. Useful as the test
//! fake for the pipeline components and as a backend for single-process
//! deployments that do not need persistence.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{ChunkRecord, ScoredChunk, VectorStore, cosine_similarity};
use crate::types::{DocumentId, PipelineError, TenantKey};

/// Process-local [`VectorStore`] implementation.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<TenantKey, BTreeMap<String, ChunkRecord>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn insert_chunks(
        &self,
        tenant: &TenantKey,
        chunks: Vec<ChunkRecord>,
    ) -> Result<(), PipelineError> {
        if chunks.is_empty() {
            return Ok(());
        }
        let mut collections = self.collections.write();
        let collection = collections.entry(tenant.clone()).or_default();
        for chunk in chunks {
            collection.insert(chunk.id.clone(), chunk);
        }
        Ok(())
    }

    async fn chunks_by_document(
        &self,
        tenant: &TenantKey,
        doc: DocumentId,
    ) -> Result<Vec<ChunkRecord>, PipelineError> {
        let collections = self.collections.read();
        Ok(collections
            .get(tenant)
            .map(|collection| {
                collection
                    .values()
                    .filter(|record| record.doc_id == doc)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn search_similar(
        &self,
        tenant: &TenantKey,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, PipelineError> {
        let collections = self.collections.read();
        let Some(collection) = collections.get(tenant) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<ScoredChunk> = collection
            .values()
            .filter_map(|record| {
                let embedding = record.embedding.as_ref()?;
                Some(ScoredChunk {
                    record: record.clone(),
                    score: cosine_similarity(embedding, query),
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete_chunks(
        &self,
        tenant: &TenantKey,
        ids: &[String],
    ) -> Result<usize, PipelineError> {
        let mut collections = self.collections.write();
        let Some(collection) = collections.get_mut(tenant) else {
            return Ok(0);
        };
        let mut removed = 0;
        for id in ids {
            if collection.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn count(&self, tenant: &TenantKey) -> Result<usize, PipelineError> {
        let collections = self.collections.read();
        Ok(collections
            .get(tenant)
            .map(|collection| collection.len())
            .unwrap_or(0))
    }
}
