//! The `ocr` subcommand.

use clap::{ArgGroup, Args};
use tokio::io::AsyncWriteExt as _;

use super::ChunkingOpts;
use crate::{
    archive::{ARCHIVE_FILE_NAME, Downloads, build_zip, output_file_names, render_display},
    document::{FileType, Upload},
    ocr::{OcrEngineType, mistral::DEFAULT_MODEL},
    prelude::*,
    process::{ProcessRequest, ResultStore, Source, process_inputs},
    ui::Ui,
};

/// Options for the `ocr` subcommand.
#[derive(Debug, Args)]
#[clap(group(ArgGroup::new("source").required(true).args(["urls", "files"])))]
pub struct OcrOpts {
    /// Are the inputs PDFs or images?
    #[clap(long = "type", value_enum, default_value_t = FileType::Pdf)]
    pub file_type: FileType,

    /// A document URL to process. May be given up to 10 times.
    #[clap(long = "url", value_name = "URL")]
    pub urls: Vec<String>,

    /// Local files to upload. PDFs must end in `.pdf`, and images in `.jpg`,
    /// `.jpeg` or `.png`.
    #[clap(value_name = "FILE", conflicts_with = "urls")]
    pub files: Vec<PathBuf>,

    #[clap(flatten)]
    pub chunking: ChunkingOpts,

    /// The OCR engine to use.
    #[clap(long, value_enum, default_value_t = OcrEngineType::default())]
    pub engine: OcrEngineType,

    /// The OCR model to use, for engines that have more than one.
    #[clap(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Write a ZIP archive with one `<key>.txt` per result.
    #[clap(long)]
    pub output_zip: Option<PathBuf>,

    /// Write one `<key>.txt` per result into this directory, plus a combined
    /// `ocr_results.zip`.
    #[clap(long)]
    pub output_dir: Option<PathBuf>,

    /// Write a self-contained HTML report with download links.
    #[clap(long)]
    pub report: Option<PathBuf>,

    /// Print results as JSON lines instead of Markdown.
    #[clap(long)]
    pub json: bool,

    /// What portion of results may fail before we exit with an error?
    /// Specified as a number between 0.0 and 1.0. Outputs are always written
    /// first.
    #[clap(long, default_value = "1.0")]
    pub allowed_failure_rate: f32,
}

/// The `ocr` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_ocr(ui: Ui, opts: &OcrOpts) -> Result<()> {
    // Check our credentials before touching any input.
    let service = opts.engine.create_service(&opts.model)?;
    let chunking = opts.chunking.to_mode()?;

    let source = if opts.files.is_empty() {
        Source::Urls(opts.urls.clone())
    } else {
        let mut uploads = Vec::with_capacity(opts.files.len());
        for path in &opts.files {
            uploads.push(Upload::from_path(path, opts.file_type).await?);
        }
        Source::Uploads(uploads)
    };
    let request = ProcessRequest {
        file_type: opts.file_type,
        source,
        chunking,
    };

    let mut results = ResultStore::new();
    process_inputs(&ui, service.as_ref(), request, &mut results).await?;

    // Show our results.
    let mut stdout = tokio::io::stdout();
    if opts.json {
        for result in results.iter() {
            let mut line = serde_json::to_vec(result).context("failed to serialize result")?;
            line.push(b'\n');
            stdout.write_all(&line).await?;
        }
    } else if !results.is_empty() {
        stdout.write_all(render_display(&results).as_bytes()).await?;
    }
    stdout.flush().await?;

    write_outputs(opts, &results).await?;
    results.counters().finish(&ui, opts.allowed_failure_rate)
}

/// Write any requested output files.
async fn write_outputs(opts: &OcrOpts, results: &ResultStore) -> Result<()> {
    if opts.output_zip.is_none() && opts.output_dir.is_none() && opts.report.is_none() {
        return Ok(());
    }
    let zip = build_zip(results)?;

    if let Some(path) = &opts.output_zip {
        write_file(path, &zip).await?;
    }

    if let Some(dir) = &opts.output_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create {:?}", dir.display()))?;
        for (name, result) in output_file_names(results) {
            write_file(&dir.join(name), result.text.as_bytes()).await?;
        }
        write_file(&dir.join(ARCHIVE_FILE_NAME), &zip).await?;
    }

    if let Some(path) = &opts.report {
        let html = Downloads::new(results, &zip).render_html_report()?;
        write_file(path, html.as_bytes()).await?;
    }
    Ok(())
}

/// Write `data` to `path`, with a useful error message.
async fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    tokio::fs::write(path, data)
        .await
        .with_context(|| format!("failed to write {:?}", path.display()))?;
    info!(path = %path.display(), bytes = data.len(), "Wrote output");
    Ok(())
}
