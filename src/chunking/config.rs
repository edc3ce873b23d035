//! Split configuration profiles.

use serde::{Deserialize, Serialize};

use crate::types::PipelineError;

/// Separator ladder tried from coarsest to finest. Character boundaries act
/// as the implicit final rung.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Window size (chars) for the storage profile used at ingestion time.
pub const STORAGE_MAX_CHARS: usize = 800;
/// Overlap (chars) shared between adjacent storage-profile segments.
pub const STORAGE_OVERLAP: usize = 200;
/// Window size (chars) for reassembling chunks into model context windows.
pub const CONTEXT_MAX_CHARS: usize = 3000;

/// Parameters for one splitting pass.
///
/// Two profiles are used in practice: [`SplitConfig::storage`] for indexing
/// and [`SplitConfig::context`] for building model-sized windows out of
/// retrieved chunks. The storage overlap width doubles as the trim width
/// during reconstruction, so it must stay constant for the lifetime of a
/// stored document set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Upper bound on segment length, in characters.
    pub max_chars: usize,
    /// Characters duplicated from the tail of each segment into the head of
    /// the next. Must be strictly smaller than `max_chars`.
    pub overlap: usize,
    /// Separator ladder, coarsest first.
    pub separators: Vec<String>,
}

impl SplitConfig {
    pub fn new(max_chars: usize, overlap: usize) -> Result<Self, PipelineError> {
        let config = Self {
            max_chars,
            overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Profile used when indexing documents: small windows with overlap so
    /// context survives the cut points.
    pub fn storage() -> Self {
        Self {
            max_chars: STORAGE_MAX_CHARS,
            overlap: STORAGE_OVERLAP,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Profile used when reassembling retrieved chunks into model context
    /// windows: large windows, no overlap.
    pub fn context() -> Self {
        Self {
            max_chars: CONTEXT_MAX_CHARS,
            overlap: 0,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.max_chars == 0 {
            return Err(PipelineError::Chunking(
                "max_chars must be greater than zero".into(),
            ));
        }
        if self.overlap >= self.max_chars {
            return Err(PipelineError::Chunking(format!(
                "overlap ({}) must be smaller than max_chars ({})",
                self.overlap, self.max_chars
            )));
        }
        Ok(())
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self::storage()
    }
}
