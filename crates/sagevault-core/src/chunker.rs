//! Boundary-aware text chunking with overlap.
//!
//! Windows of at most `max_chars` characters are cut at the last semantic
//! boundary inside the window, in priority order: markdown header, blank line,
//! sentence end, line break. A boundary is only accepted when the chunk keeps
//! at least `boundary_threshold` of the window, otherwise the window is cut at
//! `max_chars` exactly. Consecutive windows overlap by `overlap_percent`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_percent: f32,
    pub boundary_threshold: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_chars: 500, overlap_percent: 10.0, boundary_threshold: 0.6 }
    }
}

impl ChunkingConfig {
    pub fn new(max_chars: usize, overlap_percent: f32) -> Self {
        Self { max_chars, overlap_percent, ..Self::default() }.normalized()
    }

    pub fn normalized(mut self) -> Self {
        self.max_chars = self.max_chars.max(1);
        self.overlap_percent = if self.overlap_percent.is_nan() { 0.0 } else { self.overlap_percent.clamp(0.0, 100.0) };
        self.boundary_threshold =
            if self.boundary_threshold.is_nan() { 0.6 } else { self.boundary_threshold.clamp(0.5, 0.7) };
        self
    }

    /// `round(max_chars * overlap_percent / 100)`, always strictly below `max_chars`.
    pub fn overlap_chars(&self) -> usize {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let overlap = (self.max_chars as f32 * self.overlap_percent / 100.0).round() as usize;
        overlap.min(self.max_chars.saturating_sub(1))
    }

    fn min_chunk_chars(&self) -> usize {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let min = (self.max_chars as f32 * self.boundary_threshold).ceil() as usize;
        min.max(1)
    }
}

/// Splits `text` into trimmed, non-empty chunks of at most `max_chars` characters.
pub fn chunk(text: &str, max_chars: usize, overlap_percent: f32) -> Vec<String> {
    Chunker::new(ChunkingConfig::new(max_chars, overlap_percent)).split(text)
}

#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config: config.normalized() }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let max = self.config.max_chars;
        if chars.len() <= max {
            return push_trimmed(Vec::new(), &chars);
        }

        let overlap = self.config.overlap_chars();
        let min_len = self.config.min_chunk_chars();
        let mut chunks = Vec::new();
        let mut start = 0usize;
        loop {
            let window_end = (start + max).min(chars.len());
            let end = if window_end == chars.len() {
                window_end
            } else {
                find_boundary(&chars, start + min_len, window_end).unwrap_or(window_end)
            };
            chunks = push_trimmed(chunks, &chars[start..end]);
            if end >= chars.len() {
                break;
            }
            // Forward progress even when the overlap swallows the whole chunk.
            let next = end.saturating_sub(overlap);
            start = if next > start { next } else { end };
        }
        chunks
    }
}

fn push_trimmed(mut chunks: Vec<String>, chars: &[char]) -> Vec<String> {
    let piece: String = chars.iter().collect();
    let trimmed = piece.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
    chunks
}

/// Returns the exclusive cut position of the best boundary in `[earliest, end]`.
fn find_boundary(chars: &[char], earliest: usize, end: usize) -> Option<usize> {
    if earliest > end {
        return None;
    }
    let at = |i: usize| chars.get(i).copied();
    let is_header = |pos: usize| at(pos) == Some('\n') && at(pos + 1) == Some('#');
    let is_paragraph = |pos: usize| pos >= 2 && at(pos - 1) == Some('\n') && at(pos - 2) == Some('\n');
    let is_sentence =
        |pos: usize| pos >= 1 && at(pos - 1) == Some('.') && at(pos).map_or(true, char::is_whitespace);
    let is_line = |pos: usize| pos >= 1 && at(pos - 1) == Some('\n');

    let rules: [&dyn Fn(usize) -> bool; 4] = [&is_header, &is_paragraph, &is_sentence, &is_line];
    rules.iter().find_map(|rule| (earliest..=end).rev().find(|&pos| rule(pos)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_text_yields_nothing() {
        assert!(chunk("", 100, 10.0).is_empty());
        assert!(chunk("   \n\n  ", 100, 10.0).is_empty());
    }

    #[test]
    fn short_text_is_one_trimmed_chunk() {
        assert_eq!(chunk("  Short text.  ", 500, 10.0), vec!["Short text.".to_string()]);
    }

    #[test]
    fn prefers_markdown_header_over_sentence() {
        let text = format!("{}. More words here.\n## Usage\nRun the tool with flags.", "a".repeat(60));
        let chunks = chunk(&text, 100, 0.0);
        assert!(chunks[0].ends_with("More words here."), "got {:?}", chunks[0]);
        assert!(chunks[1].starts_with("## Usage"), "got {:?}", chunks[1]);
    }

    #[test]
    fn ignores_boundaries_that_would_leave_a_tiny_chunk() {
        // The only sentence end sits at 10% of the window, so the cut falls at max_chars.
        let text = format!("Tiny. {}", "b".repeat(300));
        let chunks = chunk(&text, 100, 0.0);
        assert_eq!(chunks[0].chars().count(), 100);
    }

    #[test]
    fn overlap_repeats_tail_of_previous_chunk() {
        let text: String = (0..400).map(|i| char::from(b'a' + u8::try_from(i % 26).unwrap_or(0))).collect();
        let chunks = chunk(&text, 100, 20.0);
        let tail: String = chunks[0].chars().skip(80).collect();
        assert!(chunks[1].starts_with(&tail));
    }

    #[test]
    fn overlap_chars_is_rounded_and_bounded() {
        assert_eq!(ChunkingConfig::new(500, 10.0).overlap_chars(), 50);
        assert_eq!(ChunkingConfig::new(10, 100.0).overlap_chars(), 9);
        assert_eq!(ChunkingConfig::new(0, 50.0).max_chars, 1);
    }

    #[test]
    fn multibyte_text_is_split_on_char_boundaries() {
        let text = "é".repeat(250);
        let chunks = chunk(&text, 100, 10.0);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
        assert!(chunks.len() >= 3);
    }

    proptest! {
        #[test]
        fn chunks_are_bounded_and_terminate(
            text in "[a-z .\n#]{0,600}",
            max_chars in 1usize..120,
            overlap in 0f32..=100f32,
        ) {
            let chunks = chunk(&text, max_chars, overlap);
            for c in &chunks {
                prop_assert!(!c.is_empty());
                prop_assert!(c.chars().count() <= max_chars);
            }
        }
    }
}
