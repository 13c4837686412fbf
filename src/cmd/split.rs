//! The `split` subcommand.

use clap::Args;

use crate::{
    async_utils::spawn_blocking_propagating_panics,
    chunker::{DEFAULT_PAGES_PER_CHUNK, split_pdf},
    prelude::*,
    ui::{ProgressConfig, Ui},
};

/// Options for the `split` subcommand.
#[derive(Debug, Args)]
pub struct SplitOpts {
    /// The PDF to split.
    pub input: PathBuf,

    /// Maximum number of pages in each chunk.
    #[clap(long, default_value_t = DEFAULT_PAGES_PER_CHUNK)]
    pub pages_per_chunk: usize,

    /// Directory to write chunks to. Defaults to the current directory.
    #[clap(short = 'o', long, default_value = ".")]
    pub output_dir: PathBuf,
}

/// The `split` subcommand. Writes `<stem>_part_<n>.pdf` for each chunk.
#[instrument(level = "debug", skip_all, fields(input = %opts.input.display()))]
pub async fn cmd_split(ui: Ui, opts: &SplitOpts) -> Result<()> {
    let pdf = tokio::fs::read(&opts.input)
        .await
        .with_context(|| format!("failed to read {:?}", opts.input.display()))?;
    let pages_per_chunk = opts.pages_per_chunk;
    let chunks = spawn_blocking_propagating_panics(move || split_pdf(&pdf, pages_per_chunk))
        .await
        .with_context(|| format!("failed to split {:?}", opts.input.display()))?;
    if chunks.is_empty() {
        ui.display_message("⚠️", "PDF has no pages, nothing to write");
        return Ok(());
    }

    tokio::fs::create_dir_all(&opts.output_dir)
        .await
        .with_context(|| format!("failed to create {:?}", opts.output_dir.display()))?;

    let stem = opts
        .input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_owned());
    let pb = ui.new_progress_bar(
        &ProgressConfig {
            emoji: "✂️",
            msg: "Writing chunks",
            done_msg: "Wrote chunks",
        },
        chunks.len() as u64,
    );
    for (idx, chunk) in chunks.iter().enumerate() {
        let path = opts.output_dir.join(chunk_file_name(&stem, idx + 1));
        tokio::fs::write(&path, chunk)
            .await
            .with_context(|| format!("failed to write {:?}", path.display()))?;
        debug!(path = %path.display(), bytes = chunk.len(), "Wrote chunk");
        pb.inc(1);
    }
    pb.finish_using_style();
    info!(count = chunks.len(), "Split PDF");
    Ok(())
}

/// File name for chunk `n` (1-based) of a PDF with the given stem.
fn chunk_file_name(stem: &str, n: usize) -> String {
    format!("{stem}_part_{n}.pdf")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{make_pdf, page_labels};

    #[test]
    fn chunk_names_are_one_based() {
        assert_eq!(chunk_file_name("report", 1), "report_part_1.pdf");
        assert_eq!(chunk_file_name("report", 12), "report_part_12.pdf");
    }

    #[tokio::test]
    async fn writes_one_file_per_chunk() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("big.pdf");
        tokio::fs::write(&input, make_pdf(7, 0)).await?;
        let output_dir = dir.path().join("out");

        let opts = SplitOpts {
            input,
            pages_per_chunk: 3,
            output_dir: output_dir.clone(),
        };
        cmd_split(Ui::init_for_tests(), &opts).await?;

        let part_3 = tokio::fs::read(output_dir.join("big_part_3.pdf")).await?;
        assert_eq!(page_labels(&part_3), vec!["Page 7"]);
        let part_1 = tokio::fs::read(output_dir.join("big_part_1.pdf")).await?;
        assert_eq!(page_labels(&part_1), vec!["Page 1", "Page 2", "Page 3"]);
        assert!(!output_dir.join("big_part_4.pdf").exists());
        Ok(())
    }
}
