//! ```text
//! RawText ──► chunking::splitter (storage profile) ──► segments
//!                                   │
//! segments ──► embeddings::EmbeddingProvider ──► ingestion::IngestionPipeline
//!                                   │
//!                                   └─► stores::VectorStore (per-tenant collections)
//!
//! Stored chunks ─┬─► reconstruct::Reconstructor ──► readable notes
//!                ├─► retrieval::RetrievalEngine ──► ranked hits / context windows
//!                └─► generation::QuizGenerator  ──► per-window completions
//!
//! pipeline::DocumentService ties the registry, ingestion, reconstruction,
//! and deletion together behind one orchestration surface.
//! ```

pub mod chunking;
pub mod completions;
pub mod embeddings;
pub mod generation;
pub mod ingestion;
pub mod pipeline;
pub mod reconstruct;
pub mod registry;
pub mod retrieval;
pub mod stores;
pub mod types;
pub mod vision;

pub use chunking::config::SplitConfig;
pub use chunking::splitter::split;
pub use ingestion::IngestionPipeline;
pub use pipeline::DocumentService;
pub use reconstruct::Reconstructor;
pub use retrieval::RetrievalEngine;
pub use types::{DocumentId, PipelineError, TenantKey};
