//! Orchestration: ties the registry, ingestion, reconstruction, and deletion
//! together behind one service surface.
//!
//! Ordering rules enforced here rather than in the leaves:
//! - the registry record is created before any chunk referencing it is
//!   written, and best-effort removed again if ingestion fails;
//! - reads check the registry first, so orphan chunks never resurrect a
//!   deleted document;
//! - re-ingestion of the same (tenant, document) pair is serialized, since
//!   interleaved writes under the same ordinal-scoped ids could corrupt the
//!   chunk set;
//! - deletion removes the chunk set (selected by doc-id metadata, never by an
//!   assumed ordinal range) and the registry row, surfacing any half-failure.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::embeddings::EmbeddingProvider;
use crate::ingestion::IngestionPipeline;
use crate::reconstruct::Reconstructor;
use crate::registry::{Document, DocumentRegistry};
use crate::stores::VectorStore;
use crate::types::{DocumentId, PipelineError, TenantKey};
use crate::vision::{self, DescriptionProvider, STUDY_NOTES_PROMPT};

/// Document lifecycle service: upload, notes, re-ingest, delete.
pub struct DocumentService {
    registry: Arc<dyn DocumentRegistry>,
    store: Arc<dyn VectorStore>,
    ingestion: IngestionPipeline,
    reconstructor: Reconstructor,
    doc_locks: Mutex<HashMap<(TenantKey, DocumentId), Arc<tokio::sync::Mutex<()>>>>,
}

impl DocumentService {
    pub fn new(
        registry: Arc<dyn DocumentRegistry>,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        let ingestion = IngestionPipeline::new(embedder, Arc::clone(&store));
        let overlap = ingestion.config().overlap;
        Self {
            registry,
            store: Arc::clone(&store),
            ingestion,
            reconstructor: Reconstructor::new(store).with_overlap(overlap),
            doc_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Replaces the ingestion pipeline (custom split profile or concurrency).
    /// The reconstruction trim width follows the new profile.
    #[must_use]
    pub fn with_ingestion(mut self, ingestion: IngestionPipeline) -> Self {
        let overlap = ingestion.config().overlap;
        self.ingestion = ingestion;
        self.reconstructor = Reconstructor::new(Arc::clone(&self.store)).with_overlap(overlap);
        self
    }

    fn doc_lock(&self, tenant: &TenantKey, doc: DocumentId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.doc_locks.lock();
        Arc::clone(locks.entry((tenant.clone(), doc)).or_default())
    }

    /// Registers a document and ingests its raw text.
    ///
    /// The registry record is written first so every chunk references an
    /// existing document. If ingestion fails, the record is removed again
    /// (best effort) and the ingestion error is returned — callers must not
    /// treat the document as valid until this call succeeds.
    pub async fn upload(
        &self,
        tenant: &TenantKey,
        title: &str,
        raw_text: &str,
    ) -> Result<(Document, usize), PipelineError> {
        if raw_text.trim().is_empty() {
            return Err(PipelineError::Validation(
                "document text is empty, nothing to index".into(),
            ));
        }
        let id = self.registry.create_document(tenant, title).await?;

        let lock = self.doc_lock(tenant, id);
        let _guard = lock.lock().await;
        match self.ingestion.ingest(tenant, id, raw_text).await {
            Ok(written) => {
                let document = self
                    .registry
                    .get_document(tenant, id)
                    .await?
                    .ok_or_else(|| {
                        PipelineError::Registry(format!(
                            "document {id} vanished between create and ingest"
                        ))
                    })?;
                Ok((document, written))
            }
            Err(err) => {
                if let Err(cleanup) = self.registry.delete_document(tenant, id).await {
                    warn!(
                        doc = id,
                        %cleanup,
                        "failed to roll back registry record after ingest failure; \
                         orphan document row remains"
                    );
                }
                Err(err)
            }
        }
    }

    /// Summarizes page images into note text, then uploads the result.
    pub async fn upload_images(
        &self,
        tenant: &TenantKey,
        title: &str,
        images: &[String],
        describer: &dyn DescriptionProvider,
    ) -> Result<(Document, usize), PipelineError> {
        let raw_text = vision::summarize_images(describer, images, STUDY_NOTES_PROMPT).await?;
        self.upload(tenant, title, &raw_text).await
    }

    /// Reconstructed note text for one document.
    ///
    /// Returns `Ok(None)` when the registry does not know the document for
    /// this tenant — orphan chunks, should any exist, are not served.
    pub async fn fetch_notes(
        &self,
        tenant: &TenantKey,
        doc: DocumentId,
    ) -> Result<Option<String>, PipelineError> {
        if self.registry.get_document(tenant, doc).await?.is_none() {
            return Ok(None);
        }
        self.reconstructor.reconstruct(tenant, doc).await
    }

    /// Replaces a document's chunk set with a fresh ingest of `raw_text`.
    ///
    /// Serialized per (tenant, document): concurrent re-ingests of the same
    /// document queue up instead of interleaving. The old chunk set is
    /// removed first so a shorter replacement text cannot leave stale
    /// high-ordinal chunks behind.
    pub async fn reingest(
        &self,
        tenant: &TenantKey,
        doc: DocumentId,
        raw_text: &str,
    ) -> Result<usize, PipelineError> {
        if self.registry.get_document(tenant, doc).await?.is_none() {
            return Err(PipelineError::Validation(format!(
                "document {doc} is not registered for this tenant"
            )));
        }

        let lock = self.doc_lock(tenant, doc);
        let _guard = lock.lock().await;

        let existing = self.store.chunks_by_document(tenant, doc).await?;
        if !existing.is_empty() {
            let ids: Vec<String> = existing.into_iter().map(|chunk| chunk.id).collect();
            self.store.delete_chunks(tenant, &ids).await?;
        }
        self.ingestion.ingest(tenant, doc, raw_text).await
    }

    /// Deletes a document's chunk set and its registry record.
    ///
    /// Returns the number of chunks removed. The chunk set is selected by
    /// doc-id metadata so partially failed ingests with ordinal gaps are
    /// still fully cleaned up. A registry failure after the chunks are gone
    /// is surfaced as an error naming the orphan row; a missing registry row
    /// over existing chunks is cleaned up with a warning.
    pub async fn delete(
        &self,
        tenant: &TenantKey,
        doc: DocumentId,
    ) -> Result<usize, PipelineError> {
        let lock = self.doc_lock(tenant, doc);
        let _guard = lock.lock().await;

        let chunks = self.store.chunks_by_document(tenant, doc).await?;
        let ids: Vec<String> = chunks.into_iter().map(|chunk| chunk.id).collect();
        let removed = if ids.is_empty() {
            0
        } else {
            self.store.delete_chunks(tenant, &ids).await?
        };

        let registered = self.registry.delete_document(tenant, doc).await.map_err(|err| {
            warn!(
                doc,
                removed_chunks = removed,
                "chunks deleted but registry delete failed; orphan document row remains"
            );
            err
        })?;

        if !registered && removed > 0 {
            warn!(
                doc,
                removed_chunks = removed,
                "chunk set existed without a registry record (orphan data cleaned up)"
            );
        }
        info!(doc, removed_chunks = removed, "document deleted");
        Ok(removed)
    }
}
