//! Document registry: the relational record of who owns which document.
//!
//! The registry is an external collaborator; this module defines the narrow
//! contract the pipeline consumes plus an in-memory implementation used for
//! tests and single-process deployments. The vector store has no referential
//! integrity of its own, so orchestration creates the registry record before
//! any chunk that references it is written.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::types::{DocumentId, PipelineError, TenantKey};

/// A registered document: stable id, owning tenant, title.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub tenant: TenantKey,
    pub title: String,
}

/// Narrow contract consumed from the external document registry.
#[async_trait]
pub trait DocumentRegistry: Send + Sync {
    /// Registers a new document and returns its stable id.
    async fn create_document(
        &self,
        tenant: &TenantKey,
        title: &str,
    ) -> Result<DocumentId, PipelineError>;

    /// Looks a document up, scoped to its owner. A document owned by a
    /// different tenant is `None`, not an error.
    async fn get_document(
        &self,
        tenant: &TenantKey,
        id: DocumentId,
    ) -> Result<Option<Document>, PipelineError>;

    /// Deletes a document record; returns whether it existed for this tenant.
    async fn delete_document(
        &self,
        tenant: &TenantKey,
        id: DocumentId,
    ) -> Result<bool, PipelineError>;

    /// All documents owned by the tenant.
    async fn list_documents(&self, tenant: &TenantKey) -> Result<Vec<Document>, PipelineError>;
}

/// Process-local registry implementation.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    next_id: AtomicI64,
    documents: RwLock<HashMap<DocumentId, Document>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            documents: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl DocumentRegistry for InMemoryRegistry {
    async fn create_document(
        &self,
        tenant: &TenantKey,
        title: &str,
    ) -> Result<DocumentId, PipelineError> {
        if title.trim().is_empty() {
            return Err(PipelineError::Validation("document title is empty".into()));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.documents.write().insert(
            id,
            Document {
                id,
                tenant: tenant.clone(),
                title: title.to_string(),
            },
        );
        Ok(id)
    }

    async fn get_document(
        &self,
        tenant: &TenantKey,
        id: DocumentId,
    ) -> Result<Option<Document>, PipelineError> {
        let documents = self.documents.read();
        Ok(documents
            .get(&id)
            .filter(|doc| &doc.tenant == tenant)
            .cloned())
    }

    async fn delete_document(
        &self,
        tenant: &TenantKey,
        id: DocumentId,
    ) -> Result<bool, PipelineError> {
        let mut documents = self.documents.write();
        match documents.get(&id) {
            Some(doc) if &doc.tenant == tenant => {
                documents.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_documents(&self, tenant: &TenantKey) -> Result<Vec<Document>, PipelineError> {
        let documents = self.documents.read();
        let mut owned: Vec<Document> = documents
            .values()
            .filter(|doc| &doc.tenant == tenant)
            .cloned()
            .collect();
        owned.sort_by_key(|doc| doc.id);
        Ok(owned)
    }
}
