//! Recursive character splitting of extracted document text.
//!
//! The splitter walks the text in a greedy forward scan, emitting a chunk of
//! at most `chunk_size` characters at a time. The chunk boundary prefers the
//! largest separator unit that still fits the budget (paragraph, newline,
//! sentence, word), hard-cutting at a character boundary only when no
//! separator occurs in the window. Each chunk after the first repeats the
//! final `overlap` characters of its predecessor.
//!
//! Boundaries are a pure function of the input text and the two size
//! parameters, and chunks preserve document order.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use docent_core::error::{DocentError, Result};

/// Separators tried largest-unit first when choosing a chunk boundary.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// A contiguous span of document text used as a retrieval unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: Uuid,
    /// Position of the chunk in document order.
    pub ordinal: usize,
    pub text: String,
    /// Byte length of the prefix repeated from the predecessor chunk.
    /// Zero for the first chunk. Dropping this prefix from every chunk and
    /// concatenating reconstructs the source text exactly.
    pub overlap_len: usize,
}

/// Recursive character splitter with a fixed chunk size and overlap.
#[derive(Clone, Debug)]
pub struct TextSplitter {
    chunk_size: usize,
    overlap: usize,
}

impl TextSplitter {
    /// Create a splitter. The overlap must be strictly smaller than the
    /// chunk size, otherwise the scan could not advance.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(DocentError::Config(
                "chunk_size must be positive".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(DocentError::Config(format!(
                "chunk overlap {} must be smaller than chunk size {}",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split text into ordered, overlapping chunks.
    pub fn split(&self, text: &str) -> Vec<DocumentChunk> {
        let mut chunks = Vec::new();
        if text.is_empty() {
            return chunks;
        }

        let len = text.len();
        let mut start = 0usize;
        let mut overlap_len = 0usize;

        loop {
            let hard_end = advance_chars(text, start, self.chunk_size);
            if hard_end >= len {
                chunks.push(make_chunk(chunks.len(), &text[start..], overlap_len));
                break;
            }

            let cut = self.choose_cut(text, start, hard_end);
            chunks.push(make_chunk(chunks.len(), &text[start..cut], overlap_len));

            let next_start = retreat_chars(text, cut, self.overlap);
            overlap_len = cut - next_start;
            start = next_start;
        }

        chunks
    }

    /// Pick the chunk boundary inside `[start, hard_end)`.
    ///
    /// The last occurrence of the largest separator wins, provided the cut
    /// leaves more than `overlap` characters of new content so the scan
    /// advances. The separator stays with the chunk it terminates.
    fn choose_cut(&self, text: &str, start: usize, hard_end: usize) -> usize {
        let window = &text[start..hard_end];
        for sep in SEPARATORS {
            if let Some(pos) = window.rfind(sep) {
                let cut = start + pos + sep.len();
                if text[start..cut].chars().count() > self.overlap {
                    return cut;
                }
            }
        }
        hard_end
    }
}

fn make_chunk(ordinal: usize, text: &str, overlap_len: usize) -> DocumentChunk {
    DocumentChunk {
        id: Uuid::new_v4(),
        ordinal,
        text: text.to_string(),
        overlap_len,
    }
}

/// Byte offset `n` characters forward of `start`, clamped to the text end.
fn advance_chars(text: &str, start: usize, n: usize) -> usize {
    text[start..]
        .char_indices()
        .nth(n)
        .map(|(i, _)| start + i)
        .unwrap_or(text.len())
}

/// Byte offset `n` characters back from `end`, clamped to the text start.
fn retreat_chars(text: &str, end: usize, n: usize) -> usize {
    if n == 0 {
        return end;
    }
    text[..end]
        .char_indices()
        .rev()
        .nth(n - 1)
        .map(|(i, _)| i)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reconstruct the source text by dropping each chunk's repeated prefix.
    fn reconstruct(chunks: &[DocumentChunk]) -> String {
        let mut out = String::new();
        for chunk in chunks {
            out.push_str(&chunk.text[chunk.overlap_len..]);
        }
        out
    }

    #[test]
    fn test_rejects_zero_chunk_size() {
        assert!(TextSplitter::new(0, 0).is_err());
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_chunk_size() {
        assert!(TextSplitter::new(100, 100).is_err());
        assert!(TextSplitter::new(100, 150).is_err());
        assert!(TextSplitter::new(100, 99).is_ok());
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let splitter = TextSplitter::new(1000, 100).unwrap();
        assert!(splitter.split("").is_empty());
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let splitter = TextSplitter::new(1000, 100).unwrap();
        let chunks = splitter.split("a short document");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "a short document");
        assert_eq!(chunks[0].ordinal, 0);
        assert_eq!(chunks[0].overlap_len, 0);
    }

    #[test]
    fn test_uniform_words_chunk_count() {
        // 1000 repetitions of "word " = 5000 chars. Every window of 1000
        // chars ends on a word boundary, so each chunk advances exactly
        // chunk_size - overlap = 900 chars: starts at 0, 900, ..., 4500.
        let text = "word ".repeat(1000);
        let splitter = TextSplitter::new(1000, 100).unwrap();
        let chunks = splitter.split(&text);

        assert_eq!(chunks.len(), 6);
        assert_eq!(chunks[0].text.chars().count(), 1000);
        assert_eq!(chunks[5].text.chars().count(), 500);
        assert!(chunks.iter().skip(1).all(|c| c.overlap_len == 100));
    }

    #[test]
    fn test_round_trip_reconstruction() {
        let text = "The quick brown fox jumps over the lazy dog. "
            .repeat(50)
            + "\n\n"
            + &"Second paragraph with more narrative content here. ".repeat(40);
        let splitter = TextSplitter::new(200, 40).unwrap();
        let chunks = splitter.split(&text);

        assert!(chunks.len() > 1);
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_round_trip_without_separators() {
        // No separator in range forces hard character cuts.
        let text = "x".repeat(2500);
        let splitter = TextSplitter::new(1000, 100).unwrap();
        let chunks = splitter.split(&text);

        assert!(chunks.len() > 1);
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_round_trip_multibyte_text() {
        let text = "Grüße aus München. Die Straße ist schön. ".repeat(80);
        let splitter = TextSplitter::new(300, 60).unwrap();
        let chunks = splitter.split(&text);

        assert!(chunks.len() > 1);
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_chunk_size_budget_respected() {
        let text = "Sentence one is here. Sentence two follows it. ".repeat(100);
        let splitter = TextSplitter::new(250, 50).unwrap();
        for chunk in splitter.split(&text) {
            assert!(chunk.text.chars().count() <= 250);
        }
    }

    #[test]
    fn test_overlap_prefix_matches_predecessor_suffix() {
        let text = "alpha beta gamma delta epsilon zeta eta theta ".repeat(60);
        let splitter = TextSplitter::new(200, 30).unwrap();
        let chunks = splitter.split(&text);

        for pair in chunks.windows(2) {
            let prev = &pair[0].text;
            let next = &pair[1].text;
            let prefix = &next[..pair[1].overlap_len];
            assert!(prev.ends_with(prefix));
        }
    }

    #[test]
    fn test_paragraph_separator_preferred() {
        // A paragraph break inside the window should win over the word
        // separators that follow it.
        let text = format!("{}\n\n{}", "a".repeat(400), "b ".repeat(400));
        let splitter = TextSplitter::new(500, 50).unwrap();
        let chunks = splitter.split(&text);

        assert!(chunks[0].text.ends_with("\n\n"));
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_ordinals_sequential() {
        let text = "word ".repeat(500);
        let splitter = TextSplitter::new(300, 30).unwrap();
        let chunks = splitter.split(&text);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.ordinal, i);
        }
    }

    #[test]
    fn test_boundaries_deterministic() {
        let text = "Deterministic splitting of the same input text. ".repeat(40);
        let splitter = TextSplitter::new(220, 44).unwrap();
        let first: Vec<String> = splitter.split(&text).into_iter().map(|c| c.text).collect();
        let second: Vec<String> = splitter.split(&text).into_iter().map(|c| c.text).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_overlap() {
        let text = "word ".repeat(400);
        let splitter = TextSplitter::new(250, 0).unwrap();
        let chunks = splitter.split(&text);

        assert!(chunks.iter().all(|c| c.overlap_len == 0));
        assert_eq!(reconstruct(&chunks), text);
    }
}
