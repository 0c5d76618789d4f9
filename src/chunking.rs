//! Splitting long documents into overlapping segments.
//!
//! Each segment is compared against the query on its own, so a long document
//! is judged by its best-matching passage rather than by its average.

use serde::{Deserialize, Serialize};

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default overlap between adjacent chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Chunking configuration, read from the `processing` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Overlap between adjacent chunks in characters.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    /// Split `text` with this configuration. A zero chunk size falls back
    /// to the default.
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        let size = if self.chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            self.chunk_size
        };
        chunk_text(text, size, self.overlap.min(size.saturating_sub(1)))
    }
}

/// A chunk of text from a larger document.
///
/// Produced by [`chunk_text`]. Each chunk represents a window of the
/// original text, with an index and byte offset for mapping back.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// The chunk text content.
    pub text: String,
    /// Zero-based chunk index within the document.
    pub index: usize,
    /// Byte offset where this chunk starts in the original document.
    pub start_offset: usize,
}

/// Split text into overlapping windows of at most `chunk_size` characters.
///
/// Windows end on whitespace where one is close enough. Text no longer than
/// `chunk_size` comes back as a single chunk. Offsets are byte offsets, so
/// multi-byte characters are never split.
///
/// ```
/// use ragdoll::chunking::chunk_text;
///
/// let chunks = chunk_text("Hello, world!", 1000, 0);
/// assert_eq!(chunks.len(), 1);
///
/// let text = "word ".repeat(500);
/// assert!(chunk_text(&text, 1000, 200).len() >= 2);
/// ```
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    let char_count = text.chars().count();

    // Short text doesn't need chunking
    if char_count <= chunk_size {
        return vec![Chunk {
            text: text.to_string(),
            index: 0,
            start_offset: 0,
        }];
    }

    // Build a map of char index -> byte index for O(1) lookups
    let char_to_byte: Vec<usize> = text
        .char_indices()
        .map(|(byte_idx, _)| byte_idx)
        .chain(std::iter::once(text.len()))
        .collect();

    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start_char = 0;
    let mut index = 0;

    while start_char < char_count {
        let end_char = (start_char + chunk_size).min(char_count);
        let next_start = start_char + step;

        // A tail shorter than a quarter window joins this chunk.
        let last = end_char == char_count
            || char_count.saturating_sub(next_start) < chunk_size / 4;

        let chunk_end_char = if last {
            char_count
        } else {
            find_word_boundary_char(text, &char_to_byte, start_char, end_char)
        };

        let start_byte = char_to_byte[start_char];
        let end_byte = char_to_byte[chunk_end_char];

        let chunk_text = &text[start_byte..end_byte];
        if !chunk_text.trim().is_empty() {
            chunks.push(Chunk {
                text: chunk_text.to_string(),
                index,
                start_offset: start_byte,
            });
            index += 1;
        }

        if last {
            break;
        }
        // Never skip past the end of the chunk just emitted.
        start_char = next_start.min(chunk_end_char);
    }

    chunks
}

/// Char position just past the last whitespace in the 100 chars before
/// `pos_char`, never at or before `floor_char`. Falls back to `pos_char`.
fn find_word_boundary_char(
    text: &str,
    char_to_byte: &[usize],
    floor_char: usize,
    pos_char: usize,
) -> usize {
    let search_start_char = pos_char.saturating_sub(100).max(floor_char + 1);
    if search_start_char >= pos_char {
        return pos_char;
    }

    let start_byte = char_to_byte[search_start_char];
    let end_byte = char_to_byte[pos_char];
    let search_region = &text[start_byte..end_byte];

    match search_region.rfind(char::is_whitespace) {
        Some(offset) => {
            let ws_byte = start_byte + offset;
            char_to_byte.partition_point(|&b| b <= ws_byte)
        }
        None => pos_char,
    }
}
