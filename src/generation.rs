//! Quiz generation over retrieved chunk sets.
//!
//! Each context window gets its own completion call; the calls are
//! independent, run with bounded concurrency, and their outputs are
//! aggregated in window order.

use std::sync::Arc;

use futures_util::{StreamExt, TryStreamExt, stream};
use tracing::info;

use crate::completions::CompletionProvider;
use crate::retrieval::RetrievalEngine;
use crate::types::{DocumentId, PipelineError, TenantKey};

/// System message instructing the model to emit multiple-choice questions.
pub const QUIZ_SYSTEM_MESSAGE: &str = "You are an expert teacher. From the following text, \
generate multiple-choice questions covering all key ideas. Each question should have:\n\
- a 'question' field (string),\n\
- an 'options' field (list of 4 strings), and\n\
- an 'answer' field (integer, the index [0-3] of the correct option).\n\n\
Respond only with a JSON array of such objects.";

/// Default number of completion calls in flight per quiz.
pub const DEFAULT_COMPLETION_CONCURRENCY: usize = 4;

/// Generates quizzes from stored documents or topic searches.
pub struct QuizGenerator {
    retrieval: Arc<RetrievalEngine>,
    completions: Arc<dyn CompletionProvider>,
    system_message: String,
    concurrency: usize,
}

impl QuizGenerator {
    pub fn new(retrieval: Arc<RetrievalEngine>, completions: Arc<dyn CompletionProvider>) -> Self {
        Self {
            retrieval,
            completions,
            system_message: QUIZ_SYSTEM_MESSAGE.to_string(),
            concurrency: DEFAULT_COMPLETION_CONCURRENCY,
        }
    }

    #[must_use]
    pub fn with_system_message(mut self, system_message: impl Into<String>) -> Self {
        self.system_message = system_message.into();
        self
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Quiz over one whole document. `Ok(None)` when the document has no
    /// chunks.
    pub async fn from_document(
        &self,
        tenant: &TenantKey,
        doc: DocumentId,
    ) -> Result<Option<String>, PipelineError> {
        let Some(windows) = self.retrieval.document_context(tenant, doc).await? else {
            return Ok(None);
        };
        let quiz = self.quiz_over_windows(&windows).await?;
        info!(doc, windows = windows.len(), "quiz generated from document");
        Ok(Some(quiz))
    }

    /// Quiz over the chunks nearest to a free-text topic. `Ok(None)` when the
    /// search comes back empty.
    pub async fn from_topic(
        &self,
        tenant: &TenantKey,
        topic: &str,
        top_k: usize,
    ) -> Result<Option<String>, PipelineError> {
        let hits = self.retrieval.search(tenant, topic, top_k).await?;
        if hits.is_empty() {
            return Ok(None);
        }
        let records: Vec<_> = hits.into_iter().map(|hit| hit.record).collect();
        let windows = self.retrieval.context_windows(&records);
        let quiz = self.quiz_over_windows(&windows).await?;
        info!(topic, windows = windows.len(), "quiz generated from topic");
        Ok(Some(quiz))
    }

    /// One completion call per window, order preserved in the aggregate.
    async fn quiz_over_windows(&self, windows: &[String]) -> Result<String, PipelineError> {
        let sections: Vec<String> = stream::iter(
            windows
                .iter()
                .map(|window| self.completions.complete(&self.system_message, window)),
        )
        .buffered(self.concurrency)
        .try_collect()
        .await?;
        Ok(sections.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::SplitConfig;
    use crate::embeddings::MockEmbeddingProvider;
    use crate::ingestion::IngestionPipeline;
    use crate::stores::{InMemoryVectorStore, VectorStore};
    use async_trait::async_trait;

    /// Echoes a digest of the context so tests can check ordering.
    struct EchoCompletions;

    #[async_trait]
    impl CompletionProvider for EchoCompletions {
        async fn complete(
            &self,
            _system_message: &str,
            context: &str,
        ) -> Result<String, PipelineError> {
            let head: String = context.chars().take(12).collect();
            Ok(format!("quiz[{head}]"))
        }
    }

    struct DownCompletions;

    #[async_trait]
    impl CompletionProvider for DownCompletions {
        async fn complete(&self, _: &str, _: &str) -> Result<String, PipelineError> {
            Err(PipelineError::Completion("model endpoint down".into()))
        }
    }

    async fn seeded_engine() -> (Arc<RetrievalEngine>, TenantKey) {
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
        let embedder = Arc::new(MockEmbeddingProvider::new());
        let pipeline = IngestionPipeline::new(embedder.clone(), Arc::clone(&store))
            .with_config(SplitConfig::new(60, 15).unwrap());
        let tenant = TenantKey::new("alice");
        pipeline
            .ingest(
                &tenant,
                1,
                "Mitochondria produce ATP.\n\nRibosomes synthesize proteins.\n\n\
                 The nucleus stores genetic material.\n\nChloroplasts capture light.",
            )
            .await
            .unwrap();
        let engine = RetrievalEngine::new(store, embedder)
            .with_context_config(SplitConfig::new(80, 0).unwrap());
        (Arc::new(engine), tenant)
    }

    #[tokio::test]
    async fn quiz_covers_every_window_in_order() {
        let (engine, tenant) = seeded_engine().await;
        let expected_windows = engine
            .document_context(&tenant, 1)
            .await
            .unwrap()
            .unwrap();
        assert!(expected_windows.len() > 1);

        let generator = QuizGenerator::new(engine, Arc::new(EchoCompletions));
        let quiz = generator.from_document(&tenant, 1).await.unwrap().unwrap();

        let sections: Vec<&str> = quiz.split("\n\n").collect();
        assert_eq!(sections.len(), expected_windows.len());
        for (section, window) in sections.iter().zip(&expected_windows) {
            let head: String = window.chars().take(12).collect();
            assert_eq!(*section, format!("quiz[{head}]"));
        }
    }

    #[tokio::test]
    async fn unknown_document_yields_none() {
        let (engine, tenant) = seeded_engine().await;
        let generator = QuizGenerator::new(engine, Arc::new(EchoCompletions));
        assert!(generator.from_document(&tenant, 404).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn topic_with_no_hits_yields_none() {
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
        let engine = Arc::new(RetrievalEngine::new(
            store,
            Arc::new(MockEmbeddingProvider::new()),
        ));
        let generator = QuizGenerator::new(engine, Arc::new(EchoCompletions));
        let quiz = generator
            .from_topic(&TenantKey::new("alice"), "biology", 3)
            .await
            .unwrap();
        assert!(quiz.is_none());
    }

    #[tokio::test]
    async fn topic_quiz_uses_the_matched_chunks() {
        let (engine, tenant) = seeded_engine().await;
        let generator = QuizGenerator::new(engine, Arc::new(EchoCompletions));
        let quiz = generator
            .from_topic(&tenant, "Mitochondria produce ATP.", 2)
            .await
            .unwrap();
        assert!(quiz.is_some());
    }

    #[tokio::test]
    async fn completion_failure_surfaces_as_retryable() {
        let (engine, tenant) = seeded_engine().await;
        let generator = QuizGenerator::new(engine, Arc::new(DownCompletions));
        let err = generator.from_document(&tenant, 1).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
