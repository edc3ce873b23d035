//! Reconstruction: stitch a document's stored chunks back into one text.
//!
//! Adjacent chunks share an overlap introduced at split time, so stitching
//! trims the trailing overlap width from every chunk except the last before
//! concatenating. The width is the storage profile's overlap constant; it
//! must match the width used at ingestion for the stitch to be lossless.

use std::sync::Arc;

use tracing::warn;

use crate::chunking::SplitConfig;
use crate::stores::{ChunkRecord, VectorStore};
use crate::types::{DocumentId, PipelineError, TenantKey};

/// Rebuilds readable note text from a document's chunk set.
pub struct Reconstructor {
    store: Arc<dyn VectorStore>,
    overlap: usize,
}

impl Reconstructor {
    /// Uses the storage profile's overlap width.
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self {
            store,
            overlap: SplitConfig::storage().overlap,
        }
    }

    /// Overrides the trim width for deployments that ingest with a
    /// non-default storage profile.
    #[must_use]
    pub fn with_overlap(mut self, overlap: usize) -> Self {
        self.overlap = overlap;
        self
    }

    /// Fetches, orders, and stitches the chunk set for one document.
    ///
    /// Returns `Ok(None)` when no chunks exist for the id. Ordinal gaps,
    /// duplicates, and unparsable ids are logged as data-integrity warnings;
    /// the best-effort result is still returned.
    pub async fn reconstruct(
        &self,
        tenant: &TenantKey,
        doc: DocumentId,
    ) -> Result<Option<String>, PipelineError> {
        let chunks = self.store.chunks_by_document(tenant, doc).await?;
        if chunks.is_empty() {
            return Ok(None);
        }
        let ordered = order_chunks(doc, chunks);
        if ordered.is_empty() {
            return Ok(None);
        }
        let texts: Vec<&str> = ordered.iter().map(|record| record.content.as_str()).collect();
        Ok(Some(stitch(&texts, self.overlap)))
    }
}

/// Sorts chunks by (ordinal, insertion time), warning about anomalies.
///
/// Chunks whose ids do not carry a parsable ordinal are dropped: they cannot
/// be positioned, and inserting them at an arbitrary point would corrupt the
/// output.
fn order_chunks(doc: DocumentId, chunks: Vec<ChunkRecord>) -> Vec<ChunkRecord> {
    let mut ordered = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        match chunk.ordinal() {
            Some(ordinal) => ordered.push((ordinal, chunk)),
            None => warn!(doc, id = %chunk.id, "chunk id has no parsable ordinal, dropping"),
        }
    }
    ordered.sort_by(|a, b| (a.0, a.1.inserted_at).cmp(&(b.0, b.1.inserted_at)));

    for pair in ordered.windows(2) {
        let (previous, next) = (pair[0].0, pair[1].0);
        if next == previous {
            warn!(doc, ordinal = next, "duplicate chunk ordinal detected");
        } else if next != previous + 1 {
            warn!(
                doc,
                after = previous,
                found = next,
                "gap in chunk ordinals detected"
            );
        }
    }
    if let Some((first, _)) = ordered.first() {
        if *first != 0 {
            warn!(doc, first = *first, "chunk ordinals do not start at zero");
        }
    }

    ordered.into_iter().map(|(_, chunk)| chunk).collect()
}

/// Concatenates segments, trimming the trailing `overlap` characters from
/// every segment except the last.
///
/// For a chunk set produced by the splitter with the same overlap width this
/// recovers the original text exactly.
pub fn stitch(texts: &[&str], overlap: usize) -> String {
    let mut output = String::new();
    for (index, text) in texts.iter().enumerate() {
        if index + 1 == texts.len() {
            output.push_str(text);
        } else {
            output.push_str(trim_tail_chars(text, overlap));
        }
    }
    output
}

/// Drops the final `count` characters (not bytes) of `text`.
fn trim_tail_chars(text: &str, count: usize) -> &str {
    if count == 0 {
        return text;
    }
    match text.char_indices().rev().nth(count - 1) {
        Some((byte_index, _)) => &text[..byte_index],
        None => "",
    }
}
