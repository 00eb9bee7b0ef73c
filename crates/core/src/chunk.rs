use hex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Separator priority for boundary-aware splitting. A paragraph break is
/// preferred over a line break, a line break over a plain space, and a hard
/// character cut is the last resort.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            overlap: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Content-addressed identifier: identical text yields an identical id.
    pub id: String,
    pub ordinal: usize,
    /// Byte offset range of this chunk in the source text.
    pub start: usize,
    pub end: usize,
    pub text: String,
}

pub struct Chunker {
    config: ChunkConfig,
}

impl Chunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    /// Splits `text` into overlapping chunks. Consecutive chunks tile the
    /// source: each chunk begins at most `overlap` characters before the end
    /// of the previous one, and dropping the shared prefixes reconstructs the
    /// original text exactly.
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }
        // Byte offset of every char boundary, with the total length appended
        // so `bounds[k]..bounds[k + 1]` always brackets one character.
        let mut bounds: Vec<usize> = text.char_indices().map(|(idx, _)| idx).collect();
        bounds.push(text.len());
        let total_chars = bounds.len() - 1;
        let chunk_size = self.config.chunk_size.max(1);
        let overlap = self.config.overlap.min(chunk_size.saturating_sub(1));

        let mut chunks = Vec::new();
        let mut start = 0usize;
        let mut prev_end = 0usize;
        let mut ordinal = 0usize;
        loop {
            let mut end = (start + chunk_size).min(total_chars);
            if end < total_chars {
                if let Some(cut) = separator_cut(text, &bounds, start, end, prev_end) {
                    end = cut;
                }
            }
            let (byte_start, byte_end) = (bounds[start], bounds[end]);
            let body = &text[byte_start..byte_end];
            chunks.push(Chunk {
                id: chunk_id(body),
                ordinal,
                start: byte_start,
                end: byte_end,
                text: body.to_string(),
            });
            ordinal += 1;
            if end == total_chars {
                break;
            }
            prev_end = end;
            let next = end.saturating_sub(overlap);
            start = if next > start { next } else { end };
        }
        chunks
    }
}

/// Looks for the rightmost separator inside the candidate window and returns
/// the char index just past it, so chunks break on paragraph, line, or word
/// boundaries when one exists. A cut must reach past `prev_end` so coverage
/// always advances; otherwise the caller falls back to a hard cut.
fn separator_cut(
    text: &str,
    bounds: &[usize],
    start: usize,
    end: usize,
    prev_end: usize,
) -> Option<usize> {
    let window = &text[bounds[start]..bounds[end]];
    for sep in SEPARATORS {
        if let Some(pos) = window.rfind(sep) {
            let cut_byte = bounds[start] + pos + sep.len();
            let cut = bounds.partition_point(|offset| *offset < cut_byte);
            if cut > start && cut < end && cut > prev_end {
                return Some(cut);
            }
        }
    }
    None
}

/// Stable content hash of chunk text; the dedup key for the vector index.
pub fn chunk_id(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
