//! Command-line entry points.

use clap::Args;

use crate::{
    chunker::{DEFAULT_MAX_BYTES, DEFAULT_PAGES_PER_CHUNK, SizeGate},
    prelude::*,
    process::ChunkingMode,
};

pub mod ocr;
pub mod split;

/// Options controlling how large PDFs are split.
#[derive(Debug, Clone, Args)]
pub struct ChunkingOpts {
    /// Split local PDFs larger than `--max-bytes` into chunks of
    /// `--pages-per-chunk` pages. Results are then named `<file>_part_<n>`.
    #[clap(long)]
    pub split_large_pdfs: bool,

    /// Size threshold for splitting, in bytes.
    #[clap(long, default_value_t = DEFAULT_MAX_BYTES)]
    pub max_bytes: u64,

    /// Maximum number of pages in each chunk.
    #[clap(long, default_value_t = DEFAULT_PAGES_PER_CHUNK)]
    pub pages_per_chunk: usize,
}

impl ChunkingOpts {
    /// Convert to a [`ChunkingMode`].
    pub fn to_mode(&self) -> Result<ChunkingMode> {
        if self.pages_per_chunk == 0 {
            return Err(anyhow!("--pages-per-chunk must be at least 1"));
        }
        if self.split_large_pdfs {
            Ok(ChunkingMode::SizeAware(SizeGate {
                max_bytes: self.max_bytes,
                pages_per_chunk: self.pages_per_chunk,
            }))
        } else {
            Ok(ChunkingMode::Whole)
        }
    }
}
