//! PDF text extraction and chunking for part-by-part answering.

use gtb_core::{Error, Result};

/// Chunks shorter than this many words are dropped (likely scans or empty
/// pages).
const MIN_CHUNK_WORDS: usize = 15;

/// Target chunk size, in words, when splitting a long document.
const WORDS_PER_CHUNK: usize = 1500;

/// Upper bound on chunks per document, so one PDF cannot fire an unbounded
/// number of upstream calls. Text past the cap is dropped.
const MAX_CHUNKS: usize = 10;

/// Extract the document text and split it into answerable chunks. Returns
/// `None` when no chunk carries enough text (e.g. a scanned PDF).
pub fn extract_text_chunks(pdf_bytes: &[u8]) -> Result<Option<Vec<String>>> {
    let text = pdf_extract::extract_text_from_mem(pdf_bytes)
        .map_err(|e| Error::Extraction(format!("pdf extraction failed: {e}")))?;
    Ok(chunk_text(&text))
}

/// Split on paragraph boundaries into chunks of roughly [`WORDS_PER_CHUNK`]
/// words, keeping only chunks with at least [`MIN_CHUNK_WORDS`] words and at
/// most [`MAX_CHUNKS`] chunks in total.
fn chunk_text(text: &str) -> Option<Vec<String>> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_words = 0;

    for para in text.split("\n\n") {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }
        let words = para.split_whitespace().count();
        if current_words > 0 && current_words + words > WORDS_PER_CHUNK {
            push_chunk(&mut chunks, &mut current, &mut current_words);
            if chunks.len() >= MAX_CHUNKS {
                return Some(chunks);
            }
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(para);
        current_words += words;
    }
    push_chunk(&mut chunks, &mut current, &mut current_words);

    if chunks.is_empty() {
        None
    } else {
        Some(chunks)
    }
}

fn push_chunk(chunks: &mut Vec<String>, current: &mut String, words: &mut usize) {
    if *words >= MIN_CHUNK_WORDS {
        chunks.push(std::mem::take(current));
    } else {
        current.clear();
    }
    *words = 0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_dropped() {
        assert_eq!(chunk_text("just a few words here"), None);
        assert_eq!(chunk_text(""), None);
    }

    #[test]
    fn sufficient_text_forms_one_chunk() {
        let text = "word ".repeat(40);
        let chunks = chunk_text(&text).unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn chunk_count_is_capped() {
        let para = "word ".repeat(1500);
        let text = vec![para; 100].join("\n\n");
        let chunks = chunk_text(&text).unwrap();
        assert_eq!(chunks.len(), MAX_CHUNKS);
    }

    #[test]
    fn long_document_splits_on_paragraphs() {
        let para = "word ".repeat(900);
        let text = format!("{para}\n\n{para}\n\n{para}");
        let chunks = chunk_text(&text).unwrap();
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.split_whitespace().count() >= MIN_CHUNK_WORDS);
        }
    }
}
