//! Chunking strategies for protocol documents
//!
//! Plain text splits on blank-line boundaries; extracted PDF text gets
//! fixed-size character windows with overlap. Both feed the same chunk
//! data contract.

use crate::models::Chunk;

/// Window length for PDF text, in characters
pub const WINDOW_CHARS: usize = 1000;
/// Window stride, in characters (200-character overlap)
pub const WINDOW_STRIDE: usize = 800;

/// Split plain text at paragraph granularity. Chunks are trimmed and
/// empties dropped.
pub fn paragraph_chunks(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .map(String::from)
        .collect()
}

/// Split text into overlapping fixed-size windows.
///
/// Windows are counted in characters, never bytes. The scan stops once a
/// window reaches the end of the text, so a document of exactly one
/// window length yields one chunk, not a trailing remainder. Windows that
/// are empty after trimming are dropped.
pub fn windowed_chunks(text: &str) -> Vec<String> {
    let char_starts: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let total_chars = char_starts.len();
    if total_chars == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + WINDOW_CHARS).min(total_chars);
        let byte_start = char_starts[start];
        let byte_end = if end == total_chars { text.len() } else { char_starts[end] };

        let window = text[byte_start..byte_end].trim();
        if !window.is_empty() {
            chunks.push(window.to_string());
        }

        if end == total_chars {
            break;
        }
        start += WINDOW_STRIDE;
    }

    chunks
}

/// Attach provenance to chunk texts from one source document
pub fn assemble_chunks(texts: Vec<String>, source: &str) -> Vec<Chunk> {
    let chunk_count = texts.len();
    texts
        .into_iter()
        .enumerate()
        .map(|(chunk_index, text)| Chunk {
            text,
            source: source.to_string(),
            chunk_index,
            chunk_count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraph_chunks_split_on_blank_lines() {
        let text = "Assess airway.\n\nControl hemorrhage.\n\n\n\nReassess.\n";
        let chunks = paragraph_chunks(text);
        assert_eq!(chunks, vec!["Assess airway.", "Control hemorrhage.", "Reassess."]);
    }

    #[test]
    fn test_paragraph_chunks_drop_whitespace_only() {
        assert!(paragraph_chunks("").is_empty());
        assert!(paragraph_chunks("   \n\n \t ").is_empty());
    }

    #[test]
    fn test_window_count_fixtures() {
        // (input length, expected chunk count)
        let fixtures = [
            (0, 0),
            (1, 1),
            (999, 1),
            (1000, 1),
            (1001, 2),
            (1800, 2),
            (2600, 3),
        ];
        for (len, expected) in fixtures {
            let text = "x".repeat(len);
            assert_eq!(
                windowed_chunks(&text).len(),
                expected,
                "length {} should yield {} chunks",
                len,
                expected
            );
        }
    }

    #[test]
    fn test_windows_overlap_by_two_hundred_chars() {
        // Distinct digits let us check exactly where windows start and end
        let text: String = (0..1800).map(|i| char::from(b'0' + (i % 10) as u8)).collect();
        let chunks = windowed_chunks(&text);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 1000);
        assert_eq!(chunks[1].len(), 1000);
        // Second window starts one stride in, so the first window's last
        // 200 characters reappear at its start
        assert_eq!(&chunks[0][800..], &chunks[1][..200]);
    }

    #[test]
    fn test_windows_respect_char_boundaries() {
        let text = "é".repeat(1500);
        let chunks = windowed_chunks(&text);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 1000);
        assert_eq!(chunks[1].chars().count(), 700);
    }

    #[test]
    fn test_whitespace_only_windows_dropped() {
        let text = " ".repeat(500);
        assert!(windowed_chunks(&text).is_empty());
    }

    #[test]
    fn test_assemble_chunks_indexes_monotonically() {
        let chunks = assemble_chunks(
            vec!["one".to_string(), "two".to_string()],
            "Burn Care CPG",
        );

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[1].chunk_index, 1);
        assert!(chunks.iter().all(|c| c.chunk_count == 2));
        assert_eq!(chunks[0].id(), "Burn_Care_CPG_0");
        assert_eq!(chunks[1].id(), "Burn_Care_CPG_1");
    }
}
