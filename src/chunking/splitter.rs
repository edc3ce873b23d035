//! Separator-ladder splitter producing bounded, overlapping windows.
//!
//! Segments are character-exact slices of the input: each window is at most
//! `max_chars` characters long, and every window after the first begins with
//! exactly the final `overlap` characters of its predecessor. Cut points
//! prefer the coarsest separator (paragraph break, then line break, sentence
//! boundary, word boundary) found in the back half of the window, falling
//! back to a hard character cut when no separator qualifies. Because windows
//! are exact slices, trimming the trailing overlap from each segment and
//! concatenating recovers the original text byte for byte.

use super::config::SplitConfig;

/// Splits `text` into an ordered sequence of bounded, overlapping segments.
///
/// Deterministic: identical input and configuration always produce the
/// identical sequence. Empty input yields an empty sequence; input no longer
/// than `max_chars` yields a single segment with no overlap. An invalid
/// configuration should be caught with [`SplitConfig::validate`] before
/// calling; this function assumes `overlap < max_chars`.
pub fn split(text: &str, config: &SplitConfig) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    // bounds[i] is the byte offset of character i; bounds[n] == text.len().
    let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    bounds.push(text.len());
    let n = bounds.len() - 1;

    if n <= config.max_chars {
        return vec![text.to_string()];
    }

    // A separator cut must clear the overlap region and consume at least half
    // the window; otherwise fall through to a finer separator or a hard cut.
    let min_cut = (config.max_chars / 2).max(config.overlap + 1);

    let mut segments = Vec::new();
    let mut start = 0usize; // char index
    loop {
        let hard_end = (start + config.max_chars).min(n);
        if hard_end == n {
            segments.push(text[bounds[start]..].to_string());
            break;
        }
        let cut = find_cut(text, &bounds, start + min_cut, hard_end, &config.separators)
            .unwrap_or(hard_end);
        segments.push(text[bounds[start]..bounds[cut]].to_string());
        start = cut - config.overlap;
    }
    segments
}

/// Finds the rightmost separator-aligned cut in `[floor, end]` (char
/// indices), trying separators coarsest-first. The cut lands immediately
/// after the separator, so separators stay with the preceding segment.
fn find_cut(
    text: &str,
    bounds: &[usize],
    floor: usize,
    end: usize,
    separators: &[String],
) -> Option<usize> {
    let window = &text[..bounds[end]];
    for sep in separators {
        if sep.is_empty() {
            continue;
        }
        let Some(pos) = window.rfind(sep.as_str()) else {
            continue;
        };
        let cut_byte = pos + sep.len();
        // str matches always end on character boundaries, so this lookup
        // cannot fail; a miss just means no qualifying cut for this rung.
        if let Ok(cut) = bounds.binary_search(&cut_byte) {
            if cut >= floor {
                return Some(cut);
            }
        }
    }
    None
}
