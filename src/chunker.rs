//! Split PDFs into page-range chunks.
//!
//! The OCR service rejects payloads over a certain size, so large local PDFs
//! are broken into smaller, independently valid PDFs before submission. Every
//! chunk holds a contiguous run of pages from the source, in order, and the
//! chunks together cover every page exactly once.

use std::ops::Range;

use lopdf::Document;
use thiserror::Error;

use crate::prelude::*;

/// Default number of pages per chunk.
pub const DEFAULT_PAGES_PER_CHUNK: usize = 5;

/// Default size above which a PDF is split before submission (10 MB).
pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Errors that can occur while splitting a PDF.
#[derive(Debug, Error)]
pub enum ChunkError {
    /// The input could not be parsed as a PDF.
    #[error("could not parse PDF: {0}")]
    DocumentParse(lopdf::Error),

    /// A chunk could not be written back out as a PDF.
    #[error("could not write PDF chunk {chunk}: {error}")]
    Write { chunk: usize, error: lopdf::Error },

    /// Chunks must hold at least one page.
    #[error("pages per chunk must be at least 1")]
    InvalidChunkSize,
}

/// Compute the 0-based page ranges for splitting `total_pages` pages into
/// chunks of at most `max_pages`. A `max_pages` of zero yields no ranges.
pub fn chunk_ranges(total_pages: usize, max_pages: usize) -> Vec<Range<usize>> {
    if max_pages == 0 {
        return vec![];
    }
    (0..total_pages)
        .step_by(max_pages)
        .map(|start| start..(start + max_pages).min(total_pages))
        .collect()
}

/// Split a PDF into chunks of at most `max_pages` pages each.
///
/// A document with no pages produces no chunks. A document that already fits
/// in a single chunk is returned unchanged.
#[instrument(level = "debug", skip_all, fields(len = pdf.len(), max_pages = max_pages))]
pub fn split_pdf(pdf: &[u8], max_pages: usize) -> Result<Vec<Vec<u8>>, ChunkError> {
    if max_pages == 0 {
        return Err(ChunkError::InvalidChunkSize);
    }

    let doc = Document::load_mem(pdf).map_err(ChunkError::DocumentParse)?;

    // `get_pages` is keyed by 1-based page number, in document order.
    let page_numbers = doc.get_pages().into_keys().collect::<Vec<u32>>();
    let total_pages = page_numbers.len();
    debug!(total_pages, "Loaded PDF");
    if total_pages == 0 {
        return Ok(vec![]);
    } else if total_pages <= max_pages {
        return Ok(vec![pdf.to_vec()]);
    }

    let ranges = chunk_ranges(total_pages, max_pages);
    let mut chunks = Vec::with_capacity(ranges.len());
    for (chunk_idx, range) in ranges.into_iter().enumerate() {
        // Keep this chunk's pages by deleting everything else, then drop any
        // objects that only the deleted pages referred to.
        let doomed = page_numbers
            .iter()
            .enumerate()
            .filter(|(idx, _)| !range.contains(idx))
            .map(|(_, &page_number)| page_number)
            .collect::<Vec<_>>();
        let mut chunk_doc = doc.clone();
        chunk_doc.delete_pages(&doomed);
        chunk_doc.prune_objects();

        let mut bytes = vec![];
        chunk_doc
            .save_to(&mut bytes)
            .map_err(|error| ChunkError::Write {
                chunk: chunk_idx + 1,
                error: lopdf::Error::IO(error),
            })?;
        trace!(
            chunk = chunk_idx + 1,
            first_page = range.start + 1,
            last_page = range.end,
            bytes = bytes.len(),
            "Wrote PDF chunk"
        );
        chunks.push(bytes);
    }
    Ok(chunks)
}

/// Decides whether an upload is large enough to need splitting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SizeGate {
    /// Uploads larger than this many bytes are split.
    pub max_bytes: u64,

    /// How many pages to put in each chunk when splitting.
    pub pages_per_chunk: usize,
}

impl Default for SizeGate {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            pages_per_chunk: DEFAULT_PAGES_PER_CHUNK,
        }
    }
}

impl SizeGate {
    /// Is a document of `len` bytes over our threshold?
    pub fn needs_split(&self, len: usize) -> bool {
        len as u64 > self.max_bytes
    }

    /// Split `pdf` if it's over our threshold, or return it as a single chunk.
    ///
    /// Splitting is by page count, so a chunk of very dense pages may still be
    /// larger than `max_bytes`. We log those but submit them anyway.
    pub fn chunk(&self, pdf: &[u8]) -> Result<Vec<Vec<u8>>, ChunkError> {
        if !self.needs_split(pdf.len()) {
            return Ok(vec![pdf.to_vec()]);
        }
        let chunks = split_pdf(pdf, self.pages_per_chunk)?;
        for (idx, chunk) in chunks.iter().enumerate() {
            if self.needs_split(chunk.len()) {
                warn!(
                    chunk = idx + 1,
                    bytes = chunk.len(),
                    max_bytes = self.max_bytes,
                    "PDF chunk is still over the size limit"
                );
            }
        }
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{make_pdf, page_labels};

    fn labels(pages: &[usize]) -> Vec<String> {
        pages.iter().map(|n| format!("Page {n}")).collect()
    }

    #[test]
    fn chunk_ranges_cover_all_pages() {
        assert_eq!(chunk_ranges(12, 5), vec![0..5, 5..10, 10..12]);
        assert_eq!(chunk_ranges(10, 5), vec![0..5, 5..10]);
        assert_eq!(chunk_ranges(3, 5), vec![0..3]);
        assert!(chunk_ranges(0, 5).is_empty());
        assert!(chunk_ranges(12, 0).is_empty());
        for total in 0..30 {
            for max in 1..8 {
                let ranges = chunk_ranges(total, max);
                assert_eq!(ranges.len(), total.div_ceil(max));
                let flat = ranges.into_iter().flatten().collect::<Vec<_>>();
                assert_eq!(flat, (0..total).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn split_twelve_pages_into_three_chunks() {
        let pdf = make_pdf(12, 0);
        let chunks = split_pdf(&pdf, 5).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(page_labels(&chunks[0]), labels(&[1, 2, 3, 4, 5]));
        assert_eq!(page_labels(&chunks[1]), labels(&[6, 7, 8, 9, 10]));
        assert_eq!(page_labels(&chunks[2]), labels(&[11, 12]));
    }

    #[test]
    fn chunks_reconstruct_original_page_order() {
        for (total, max) in [(7, 1), (7, 2), (9, 3), (10, 4)] {
            let pdf = make_pdf(total, 0);
            let chunks = split_pdf(&pdf, max).unwrap();
            assert_eq!(chunks.len(), total.div_ceil(max));
            let joined = chunks
                .iter()
                .flat_map(|chunk| page_labels(chunk))
                .collect::<Vec<_>>();
            assert_eq!(joined, labels(&(1..=total).collect::<Vec<_>>()));
        }
    }

    #[test]
    fn small_pdf_is_a_single_unchanged_chunk() {
        let pdf = make_pdf(3, 0);
        let chunks = split_pdf(&pdf, 5).unwrap();
        assert_eq!(chunks, vec![pdf.clone()]);
        assert_eq!(page_labels(&chunks[0]), labels(&[1, 2, 3]));
    }

    #[test]
    fn zero_page_pdf_has_no_chunks() {
        let pdf = make_pdf(0, 0);
        assert!(split_pdf(&pdf, 5).unwrap().is_empty());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = split_pdf(b"this is not a PDF", 5).unwrap_err();
        assert!(matches!(err, ChunkError::DocumentParse(_)));
        assert!(err.to_string().starts_with("could not parse PDF"));
    }

    #[test]
    fn zero_pages_per_chunk_is_rejected() {
        let pdf = make_pdf(2, 0);
        assert!(matches!(
            split_pdf(&pdf, 0).unwrap_err(),
            ChunkError::InvalidChunkSize
        ));
    }

    #[test]
    fn size_gate_passes_small_documents_through() {
        let pdf = make_pdf(12, 0);
        let gate = SizeGate::default();
        assert!(!gate.needs_split(pdf.len()));
        assert_eq!(gate.chunk(&pdf).unwrap(), vec![pdf]);
    }

    #[test]
    fn size_gate_splits_large_documents_by_page_count() {
        // 12 pages and about 15 MB, over the default 10 MB limit.
        let pdf = make_pdf(12, 15 * 1024 * 1024);
        let gate = SizeGate::default();
        assert!(gate.needs_split(pdf.len()));
        let chunks = gate.chunk(&pdf).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(page_labels(&chunks[2]), labels(&[11, 12]));
    }

    #[test]
    fn size_gate_uses_configured_limits() {
        let pdf = make_pdf(4, 0);
        let gate = SizeGate {
            max_bytes: 10,
            pages_per_chunk: 3,
        };
        let chunks = gate.chunk(&pdf).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(page_labels(&chunks[1]), labels(&[4]));
    }
}
