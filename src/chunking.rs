//! Sliding-window chunking with sentence-boundary snapping.
//!
//! The chunker slides a fixed-size character window across the text,
//! advancing by `size - overlap` per step. When a window is cut short of the
//! text's end, the cut is pulled back to the last sentence-terminal
//! character inside the window, provided that terminal sits past the window
//! midpoint so at most half a window of content is deferred to the next
//! step. Candidates shorter than [`MIN_CHUNK_CHARS`] after trimming are
//! treated as noise and discarded.
//!
//! Pure function of its inputs; windows operate on `char` boundaries, never
//! raw bytes.

/// Minimum trimmed length (in chars) for a chunk to be kept.
pub const MIN_CHUNK_CHARS: usize = 50;

const SENTENCE_TERMINALS: [char; 3] = ['.', '?', '!'];

/// Splits `text` into overlapping, sentence-aware chunks of at most `size`
/// characters.
///
/// `overlap` is clamped below `size` so the window always advances; a
/// degenerate `overlap >= size` configuration therefore still terminates.
pub fn chunk(text: &str, size: usize, overlap: usize) -> Vec<String> {
    if size == 0 || text.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let overlap = overlap.min(size - 1);
    let stride = size - overlap;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < chars.len() {
        let end = (start + size).min(chars.len());
        let mut cut = end;

        // Snap to the last sentence terminal, but only when the window was
        // truncated by the size bound rather than the end of the text, and
        // only when the terminal lies past the window midpoint.
        if end < chars.len() {
            if let Some(rel) = chars[start..end]
                .iter()
                .rposition(|c| SENTENCE_TERMINALS.contains(c))
            {
                if rel > size / 2 {
                    cut = start + rel + 1;
                }
            }
        }

        let candidate: String = chars[start..cut].iter().collect();
        let trimmed = candidate.trim();
        if trimmed.chars().count() >= MIN_CHUNK_CHARS {
            chunks.push(trimmed.to_string());
        }

        start += stride;
    }

    chunks
}
