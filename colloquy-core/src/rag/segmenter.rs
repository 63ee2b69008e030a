//! Recursive, separator-aware text segmentation.
//!
//! Text is first broken into pieces along the highest-priority separator that
//! occurs in it, falling back to lower-priority separators for pieces that are
//! still too large, and finally to plain character boundaries. The pieces are
//! then packed into chunks where every chunk after the first begins with the
//! trailing `overlap` characters of its predecessor.
//!
//! All sizes are counted in characters, never bytes, so multi-byte text is
//! never cut inside a code point.

use crate::config::ConfigError;

/// A contiguous slice of source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// Byte offset of the first character of `text` in the source
    pub start: usize,
    /// Position of this chunk in the sequence
    pub index: usize,
    pub source: Option<String>,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Splits text into overlapping chunks.
#[derive(Debug, Clone)]
pub struct Segmenter {
    max_chunk_size: usize,
    overlap: usize,
    separators: Vec<String>,
}

impl Segmenter {
    /// Creates a segmenter.
    ///
    /// Fails if `max_chunk_size` is zero or `overlap` is not smaller than it.
    pub fn new(
        max_chunk_size: usize,
        overlap: usize,
        separators: Vec<String>,
    ) -> Result<Self, ConfigError> {
        if max_chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk size must be greater than 0".into()));
        }
        if overlap >= max_chunk_size {
            return Err(ConfigError::Invalid(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, max_chunk_size
            )));
        }

        Ok(Self {
            max_chunk_size,
            overlap,
            separators,
        })
    }

    pub fn from_config(config: &crate::config::RagConfig) -> Result<Self, ConfigError> {
        Self::new(config.chunk_size, config.chunk_overlap, config.separators.clone())
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Lazily segments `text`. Clone the returned iterator to restart it.
    pub fn split<'a>(&self, text: &'a str) -> Chunks<'a> {
        self.split_with_source(text, None)
    }

    pub fn split_with_source<'a>(&self, text: &'a str, source: Option<&str>) -> Chunks<'a> {
        let step = self.max_chunk_size - self.overlap;
        let mut pieces = Vec::new();
        atomize(text, 0, &self.separators, step, &mut pieces);

        Chunks {
            source_text: text,
            source: source.map(str::to_string),
            pieces,
            cursor: 0,
            carry: None,
            previous_tail: None,
            index: 0,
            max_chunk_size: self.max_chunk_size,
            overlap: self.overlap,
        }
    }

    /// Convenience wrapper returning the chunk texts.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split(text).map(|c| c.text).collect()
    }
}

/// A run of source text that is either kept whole or may be cut anywhere.
#[derive(Debug, Clone, Copy)]
struct Piece {
    /// Byte range in the source text
    start: usize,
    end: usize,
    chars: usize,
    divisible: bool,
}

fn atomize(text: &str, offset: usize, separators: &[String], limit: usize, out: &mut Vec<Piece>) {
    if text.is_empty() {
        return;
    }

    let chars = text.chars().count();
    if chars <= limit {
        out.push(Piece {
            start: offset,
            end: offset + text.len(),
            chars,
            divisible: false,
        });
        return;
    }

    // First separator that actually occurs; everything after it is a fallback.
    let chosen = separators
        .iter()
        .position(|sep| !sep.is_empty() && text.contains(sep.as_str()));

    let Some(position) = chosen else {
        out.push(Piece {
            start: offset,
            end: offset + text.len(),
            chars,
            divisible: true,
        });
        return;
    };

    let separator = separators[position].as_str();
    let fallback = &separators[position + 1..];
    let mut piece_offset = offset;

    for part in text.split_inclusive(separator) {
        atomize(part, piece_offset, fallback, limit, out);
        piece_offset += part.len();
    }
}

/// Iterator over the chunks of one text. Produced by [`Segmenter::split`].
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    source_text: &'a str,
    source: Option<String>,
    pieces: Vec<Piece>,
    cursor: usize,
    /// Unconsumed remainder of a divisible piece
    carry: Option<Piece>,
    /// Byte offset where the previous chunk's trailing overlap begins
    previous_tail: Option<usize>,
    index: usize,
    max_chunk_size: usize,
    overlap: usize,
}

impl<'a> Chunks<'a> {
    fn next_piece(&mut self) -> Option<Piece> {
        if let Some(piece) = self.carry.take() {
            return Some(piece);
        }
        let piece = self.pieces.get(self.cursor).copied();
        if piece.is_some() {
            self.cursor += 1;
        }
        piece
    }

    /// Splits a divisible piece after `take` characters.
    fn cut(&self, piece: Piece, take: usize) -> (Piece, Piece) {
        let text = &self.source_text[piece.start..piece.end];
        let split_at = text
            .char_indices()
            .nth(take)
            .map(|(i, _)| piece.start + i)
            .unwrap_or(piece.end);

        (
            Piece {
                start: piece.start,
                end: split_at,
                chars: take,
                divisible: true,
            },
            Piece {
                start: split_at,
                end: piece.end,
                chars: piece.chars - take,
                divisible: true,
            },
        )
    }

    fn tail_start(&self, chunk_start: usize, chunk_end: usize) -> usize {
        if self.overlap == 0 {
            return chunk_end;
        }
        let chunk = &self.source_text[chunk_start..chunk_end];
        let chars = chunk.chars().count();
        if chars <= self.overlap {
            return chunk_start;
        }
        chunk
            .char_indices()
            .nth(chars - self.overlap)
            .map(|(i, _)| chunk_start + i)
            .unwrap_or(chunk_start)
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let first = self.next_piece()?;

        let (chunk_start, budget) = match self.previous_tail {
            Some(tail) if self.overlap > 0 => (tail, self.max_chunk_size - self.overlap),
            _ => (first.start, self.max_chunk_size),
        };

        let mut used = 0;
        let mut end = first.start;
        let mut pending = Some(first);

        while let Some(piece) = pending.take().or_else(|| self.next_piece()) {
            let remaining = budget - used;

            if piece.chars <= remaining {
                used += piece.chars;
                end = piece.end;
                if used == budget {
                    break;
                }
                continue;
            }

            if piece.divisible && remaining > 0 {
                let (head, rest) = self.cut(piece, remaining);
                end = head.end;
                self.carry = Some(rest);
                break;
            }

            if used == 0 {
                // Whole pieces never exceed the budget; this only guards against looping.
                end = piece.end;
                break;
            }

            self.carry = Some(piece);
            break;
        }

        let text = &self.source_text[chunk_start..end];
        self.previous_tail = Some(self.tail_start(chunk_start, end));

        let chunk = Chunk {
            text: text.to_string(),
            start: chunk_start,
            index: self.index,
            source: self.source.clone(),
        };
        self.index += 1;
        Some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_separators;

    fn segmenter(max: usize, overlap: usize) -> Segmenter {
        Segmenter::new(max, overlap, default_separators()).unwrap()
    }

    fn char_prefix(s: &str, n: usize) -> String {
        s.chars().take(n).collect()
    }

    fn char_suffix(s: &str, n: usize) -> String {
        let len = s.chars().count();
        s.chars().skip(len.saturating_sub(n)).collect()
    }

    /// Rebuilds the source from chunk 0 plus every later chunk minus its overlap prefix.
    fn reconstruct(chunks: &[String], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(chunk);
            } else {
                out.extend(chunk.chars().skip(overlap));
            }
        }
        out
    }

    fn assert_invariants(text: &str, max: usize, overlap: usize) {
        let chunks = segmenter(max, overlap).split_text(text);

        assert_eq!(reconstruct(&chunks, overlap), text);
        for chunk in &chunks {
            assert!(!chunk.is_empty());
            assert!(chunk.chars().count() <= max, "chunk too long: {:?}", chunk);
        }
        for pair in chunks.windows(2) {
            assert_eq!(char_suffix(&pair[0], overlap), char_prefix(&pair[1], overlap));
        }
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_size() {
        assert!(Segmenter::new(100, 100, default_separators()).is_err());
        assert!(Segmenter::new(100, 150, default_separators()).is_err());
        assert!(Segmenter::new(0, 0, default_separators()).is_err());
        assert!(Segmenter::new(100, 99, default_separators()).is_ok());
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(segmenter(10, 2).split("").next().is_none());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks: Vec<Chunk> = segmenter(10, 2).split("Hello").collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello");
        assert_eq!(chunks[0].start, 0);
    }

    #[test]
    fn test_no_separators_2500_chars() {
        let text = "x".repeat(2500);
        let chunks: Vec<Chunk> = segmenter(1000, 200).split(&text).collect();

        let sizes: Vec<usize> = chunks.iter().map(Chunk::char_len).collect();
        assert_eq!(sizes, vec![1000, 1000, 900]);
        assert_eq!(chunks[1].start, 800);
        assert_eq!(chunks[2].start, 1600);
        // New content per chunk
        assert_eq!(1000 + (1000 - 200) + (900 - 200), 2500);
        assert_invariants(&text, 1000, 200);
    }

    #[test]
    fn test_fixed_window_with_overlap() {
        let chunks = segmenter(10, 2).split_text("0123456789ABCDEF");
        assert_eq!(chunks, vec!["0123456789", "89ABCDEF"]);
    }

    #[test]
    fn test_prefers_paragraph_breaks() {
        let text = "alpha beta gamma.\n\ndelta epsilon zeta.\n\neta theta iota.";
        let chunks = segmenter(24, 0).split_text(text);
        assert_eq!(
            chunks,
            vec!["alpha beta gamma.\n\n", "delta epsilon zeta.\n\n", "eta theta iota."]
        );
    }

    #[test]
    fn test_falls_back_to_words() {
        let text = "one two three four five six seven eight nine ten";
        let chunks = segmenter(15, 0).split_text(text);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 15);
        }
        assert_eq!(chunks.concat(), text);
        assert_eq!(chunks[0], "one two three ");
    }

    #[test]
    fn test_invariants_on_prose() {
        let text = "Machine learning is a field of study.\n\nIt gives computers the ability to learn \
                    without being explicitly programmed. Models improve with data. \
                    Deep learning uses neural networks.\nReinforcement learning uses rewards. "
            .repeat(7);
        assert_invariants(&text, 120, 30);
        assert_invariants(&text, 64, 0);
        assert_invariants(&text, 200, 199);
    }

    #[test]
    fn test_multibyte_characters() {
        let text = "héllo wörld ünïcode ✓ ".repeat(20);
        assert_invariants(&text, 17, 5);

        let arabic = "تقسيم النص الكبير لقطع صغيرة".repeat(10);
        assert_invariants(&arabic, 30, 7);
    }

    #[test]
    fn test_iterator_is_restartable() {
        let text = "a b c d e f g h i j k l m n o p".to_string();
        let seg = segmenter(8, 2);
        let chunks = seg.split(&text);
        let first: Vec<Chunk> = chunks.clone().collect();
        let second: Vec<Chunk> = chunks.collect();
        assert_eq!(first, second);
        assert_eq!(first.iter().map(|c| c.index).collect::<Vec<_>>(), (0..first.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_chunk_offsets_point_into_source() {
        let text = "First sentence here. Second sentence there. Third one.";
        for chunk in segmenter(20, 5).split_with_source(text, Some("doc.txt")) {
            assert_eq!(&text[chunk.start..chunk.start + chunk.text.len()], chunk.text);
            assert_eq!(chunk.source.as_deref(), Some("doc.txt"));
        }
    }

    #[test]
    fn test_character_fallback_without_empty_separator() {
        let seg = Segmenter::new(5, 1, vec![" ".to_string()]).unwrap();
        let chunks = seg.split_text("abcdefghij k");
        assert_eq!(chunks, vec!["abcde", "efghi", "ij k"]);
    }
}
