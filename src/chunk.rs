//! Line-accumulating text chunker.
//!
//! Folds extracted lines into [`TextChunk`]s of at least `min_chars`
//! characters of line text. Each chunk keeps a [`LineRef`] for every line
//! folded into it so answers can point back at pages.
//!
//! The threshold counts the characters of the lines themselves (Unicode
//! scalars, not bytes); the `\n` joining them does not count. A 999-char
//! line followed by a 2-char line is therefore one chunk.

use crate::models::{ExtractedLine, LineRef, TextChunk};

/// Fold lines into chunks. The final partial chunk is always emitted.
///
/// Document boundaries are not preserved: a chunk may span the end of one
/// upload and the start of the next. Each reference carries its own
/// `document_index`.
pub fn chunk_lines(lines: &[ExtractedLine], min_chars: usize) -> Vec<TextChunk> {
    let mut chunks = Vec::new();
    let mut buf = String::new();
    let mut refs: Vec<LineRef> = Vec::new();
    let mut char_count = 0usize;

    for line in lines {
        buf.push_str(&line.text);
        buf.push('\n');
        refs.push(line.reference());
        char_count += line.text.chars().count();

        if char_count >= min_chars {
            flush(&mut chunks, &mut buf, &mut refs);
            char_count = 0;
        }
    }

    if !buf.is_empty() {
        flush(&mut chunks, &mut buf, &mut refs);
    }

    chunks
}

fn flush(chunks: &mut Vec<TextChunk>, buf: &mut String, refs: &mut Vec<LineRef>) {
    let content = buf.trim();
    // Whitespace-only runs carry nothing worth embedding.
    if !content.is_empty() {
        chunks.push(TextChunk {
            content: content.to_string(),
            references: std::mem::take(refs),
        });
    } else {
        refs.clear();
    }
    buf.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(doc: usize, page: u32, n: u32, text: &str) -> ExtractedLine {
        ExtractedLine {
            document_index: doc,
            page_number: page,
            line_number: n,
            text: text.to_string(),
        }
    }

    fn one_page(texts: &[&str]) -> Vec<ExtractedLine> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| line(0, 1, i as u32 + 1, t))
            .collect()
    }

    #[test]
    fn three_short_lines_make_one_chunk() {
        let chunks = chunk_lines(&one_page(&["Hello", "World", "Test"]), 1000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Hello\nWorld\nTest");
        assert_eq!(
            chunks[0].reference_labels(),
            vec!["Page 1, Line 1", "Page 1, Line 2", "Page 1, Line 3"]
        );
    }

    #[test]
    fn no_lines_no_chunks() {
        assert!(chunk_lines(&[], 1000).is_empty());
    }

    #[test]
    fn boundary_999_then_2_is_one_chunk() {
        let long = "a".repeat(999);
        let chunks = chunk_lines(&one_page(&[&long, "bb"]), 1000);
        assert_eq!(chunks.len(), 1);
        let text_chars: usize = chunks[0].content.lines().map(|l| l.chars().count()).sum();
        assert_eq!(text_chars, 1001);
        assert_eq!(chunks[0].references.len(), 2);
    }

    #[test]
    fn exactly_threshold_flushes_immediately() {
        let full = "x".repeat(1000);
        let chunks = chunk_lines(&one_page(&[&full, "tail"]), 1000);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content.len(), 1000);
        assert_eq!(chunks[1].content, "tail");
        assert_eq!(chunks[1].references[0].line_number, 2);
    }

    #[test]
    fn single_char_lines_give_ceil_chunks() {
        for total in [1usize, 999, 1000, 1001, 2500, 3000] {
            let lines: Vec<ExtractedLine> = (0..total)
                .map(|i| line(0, 1, i as u32 + 1, "z"))
                .collect();
            let chunks = chunk_lines(&lines, 1000);
            assert_eq!(chunks.len(), total.div_ceil(1000), "total = {}", total);
        }
    }

    #[test]
    fn chunks_reconstruct_input_and_count_refs() {
        let texts: Vec<String> = (0..300).map(|i| format!("line number {}", i)).collect();
        let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
        let lines = one_page(&refs);
        let chunks = chunk_lines(&lines, 250);
        assert!(chunks.len() > 1);

        let rebuilt: String = chunks
            .iter()
            .map(|c| c.content.split_whitespace().collect::<String>())
            .collect();
        let original: String = texts
            .iter()
            .map(|t| t.split_whitespace().collect::<String>())
            .collect();
        assert_eq!(rebuilt, original);

        let total_refs: usize = chunks.iter().map(|c| c.references.len()).sum();
        assert_eq!(total_refs, lines.len());
        for c in &chunks {
            assert_eq!(c.references.len(), c.content.lines().count());
        }
    }

    #[test]
    fn threshold_counts_chars_not_bytes() {
        // 500 two-byte chars: 1000 bytes but only 500 chars.
        let accented = "é".repeat(500);
        let chunks = chunk_lines(&one_page(&[&accented, "more"]), 1000);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn chunks_can_span_documents() {
        let lines = vec![line(0, 1, 1, "first doc"), line(1, 1, 1, "second doc")];
        let chunks = chunk_lines(&lines, 1000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].references[0].document_index, 0);
        assert_eq!(chunks[0].references[1].document_index, 1);
    }

    #[test]
    fn whitespace_only_tail_is_dropped() {
        let full = "y".repeat(1000);
        let chunks = chunk_lines(&one_page(&[&full, "", "   "]), 1000);
        assert_eq!(chunks.len(), 1);
    }
}
