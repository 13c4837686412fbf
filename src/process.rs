//! Running a batch of documents through an OCR service.
//!
//! One call to [`process_inputs`] corresponds to one "Process" action: every
//! URL or upload is submitted in turn, and each outcome (text, "no result", or
//! an error message) lands in a [`ResultStore`] owned by the caller. Failures
//! never abort the run; they become result text like everything else.

use crate::{
    async_utils::spawn_blocking_propagating_panics,
    chunker::SizeGate,
    document::{FileType, Upload},
    ocr::{DocumentDescriptor, OcrResponse, OcrService, error_text},
    prelude::*,
    ui::{ProgressConfig, Ui},
};

/// Maximum number of URLs in a single run.
pub const MAX_URLS: usize = 10;

/// Outcome of a single submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    /// The service returned text.
    Ok,

    /// The service returned nothing we could use.
    Empty,

    /// The document could not be read, or the service call failed.
    Failed,
}

/// A single result, keyed by URL, file name or chunk name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OcrResult {
    /// Unique key for this result within a run.
    pub key: String,

    /// Did we get any text?
    pub status: ResultStatus,

    /// The extracted Markdown, the "no result" sentinel, or an error message.
    pub text: String,
}

/// Results from a single run, in the order they were produced.
#[derive(Clone, Debug, Default)]
pub struct ResultStore {
    results: Vec<OcrResult>,
}

impl ResultStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a result. If `key` is already taken, a ` (2)`, ` (3)`, ... suffix
    /// is added so earlier results are never overwritten. Returns the key
    /// actually used.
    pub fn insert(&mut self, key: &str, status: ResultStatus, text: String) -> &str {
        let mut unique_key = key.to_owned();
        let mut n = 1;
        while self.get(&unique_key).is_some() {
            n += 1;
            unique_key = format!("{key} ({n})");
        }
        if n > 1 {
            warn!(%key, %unique_key, "Duplicate result key");
        }
        self.results.push(OcrResult {
            key: unique_key,
            status,
            text,
        });
        &self.results[self.results.len() - 1].key
    }

    /// Look up a result by key.
    pub fn get(&self, key: &str) -> Option<&OcrResult> {
        self.results.iter().find(|result| result.key == key)
    }

    /// Iterate over results in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &OcrResult> {
        self.results.iter()
    }

    /// How many results do we have?
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Do we have any results?
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Remove all results.
    pub fn clear(&mut self) {
        self.results.clear();
    }

    /// Count results by status.
    pub fn counters(&self) -> ResultCounters {
        let mut counters = ResultCounters::default();
        for result in &self.results {
            counters.total += 1;
            match result.status {
                ResultStatus::Ok => {}
                ResultStatus::Empty => counters.empty += 1,
                ResultStatus::Failed => counters.failed += 1,
            }
        }
        counters
    }
}

/// Summary counts for a [`ResultStore`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResultCounters {
    /// How many results were produced?
    pub total: usize,

    /// How many had no text?
    pub empty: usize,

    /// How many failed?
    pub failed: usize,
}

impl ResultCounters {
    /// Report counts to the user, and fail if more than
    /// `allowed_failure_rate` of results failed.
    pub fn finish(&self, ui: &Ui, allowed_failure_rate: f32) -> Result<()> {
        if self.empty > 0 {
            ui.display_message(
                "⚠️",
                &format!("{} results had no text", self.empty),
            );
        }
        if self.failed > 0 {
            ui.display_message(
                "❌",
                &format!("{} results could not be processed", self.failed),
            );
        }
        if self.total == 0 {
            return Ok(());
        }
        let failure_rate = self.failed as f32 / self.total as f32;
        if failure_rate > allowed_failure_rate {
            Err(anyhow!(
                "{}/{} ({:.2}%) of results were failures, but only {:.2}% were allowed",
                self.failed,
                self.total,
                failure_rate * 100.0,
                allowed_failure_rate * 100.0
            ))
        } else {
            Ok(())
        }
    }
}

/// Where our documents come from.
#[derive(Clone, Debug)]
pub enum Source {
    /// Remote documents. Blank entries are skipped.
    Urls(Vec<String>),

    /// Local files, already read into memory.
    Uploads(Vec<Upload>),
}

/// How should uploads be divided before submission?
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChunkingMode {
    /// Submit each upload whole, keyed by its file name.
    #[default]
    Whole,

    /// Split large PDF uploads using a [`SizeGate`]. Every upload is keyed as
    /// `<name>_part_<n>`, even when it fits in a single chunk.
    SizeAware(SizeGate),
}

/// Everything needed for one run.
#[derive(Clone, Debug)]
pub struct ProcessRequest {
    /// Are these PDFs or images?
    pub file_type: FileType,

    /// The documents to process.
    pub source: Source,

    /// How to handle large uploads.
    pub chunking: ChunkingMode,
}

impl ProcessRequest {
    /// Check the request before doing any work.
    pub fn validate(&self) -> Result<()> {
        match &self.source {
            Source::Urls(urls) if urls.len() > MAX_URLS => Err(anyhow!(
                "at most {} URLs may be processed at once, got {}",
                MAX_URLS,
                urls.len()
            )),
            Source::Urls(urls) if urls.iter().all(|url| url.trim().is_empty()) => {
                Err(anyhow!("no URLs to process"))
            }
            Source::Uploads(uploads) if uploads.is_empty() => {
                Err(anyhow!("no files to process"))
            }
            _ => Ok(()),
        }
    }
}

/// Process every document in `request`, replacing the contents of `store`.
///
/// Documents are handled one at a time, in order. Only an invalid request is
/// an error; per-document failures are recorded in `store`.
#[instrument(level = "debug", skip_all, fields(file_type = ?request.file_type))]
pub async fn process_inputs(
    ui: &Ui,
    service: &dyn OcrService,
    request: ProcessRequest,
    store: &mut ResultStore,
) -> Result<()> {
    request.validate()?;
    store.clear();

    let file_type = request.file_type;
    match request.source {
        Source::Urls(urls) => {
            for url in urls.iter().filter(|url| !url.trim().is_empty()) {
                let document = DocumentDescriptor::for_url(file_type, url.as_str());
                submit(ui, service, store, url, &document).await;
            }
        }
        Source::Uploads(uploads) => {
            for upload in uploads {
                match request.chunking {
                    ChunkingMode::Whole => {
                        let document = DocumentDescriptor::for_inline(
                            file_type,
                            &upload.mime_type,
                            &upload.data,
                        );
                        submit(ui, service, store, &upload.name, &document).await;
                    }
                    ChunkingMode::SizeAware(gate) => {
                        process_chunked_upload(ui, service, store, file_type, gate, upload)
                            .await;
                    }
                }
            }
        }
    }

    info!(results = store.len(), "Finished processing");
    Ok(())
}

/// Split an upload if needed, and submit each chunk as `<name>_part_<n>`.
#[instrument(level = "debug", skip_all, fields(name = %upload.name))]
async fn process_chunked_upload(
    ui: &Ui,
    service: &dyn OcrService,
    store: &mut ResultStore,
    file_type: FileType,
    gate: SizeGate,
    upload: Upload,
) {
    let Upload {
        name,
        mime_type,
        data,
    } = upload;

    // Images are never split.
    let chunks = if file_type == FileType::Pdf && gate.needs_split(data.len()) {
        info!(%name, bytes = data.len(), "Splitting large PDF");
        spawn_blocking_propagating_panics(move || gate.chunk(&data)).await
    } else {
        Ok(vec![data])
    };

    let chunks = match chunks {
        Ok(chunks) => chunks,
        Err(err) => {
            let err = anyhow::Error::new(err).context(format!("failed to split {name}"));
            warn!(%name, "{err:#}");
            store.insert(&name, ResultStatus::Failed, error_text(&err));
            return;
        }
    };
    if chunks.is_empty() {
        warn!(%name, "PDF has no pages, nothing to submit");
    }

    for (idx, chunk) in chunks.iter().enumerate() {
        let key = format!("{}_part_{}", name, idx + 1);
        let document = DocumentDescriptor::for_inline(file_type, &mime_type, chunk);
        submit(ui, service, store, &key, &document).await;
    }
}

/// Submit one document and record the outcome under `key`.
#[instrument(level = "debug", skip_all, fields(key = %key))]
async fn submit(
    ui: &Ui,
    service: &dyn OcrService,
    store: &mut ResultStore,
    key: &str,
    document: &DocumentDescriptor,
) {
    let msg = format!("Processing {key}...");
    let done_msg = format!("Processed {key}");
    let spinner = ui.new_spinner(&ProgressConfig {
        emoji: "📄",
        msg: &msg,
        done_msg: &done_msg,
    });

    let (status, text) = match service.process(document).await {
        Ok(response @ OcrResponse::Pages(_)) => (ResultStatus::Ok, response.to_text()),
        Ok(response @ OcrResponse::Empty) => (ResultStatus::Empty, response.to_text()),
        Err(err) => {
            warn!(%key, "OCR failed: {err:#}");
            (ResultStatus::Failed, error_text(&err))
        }
    };
    store.insert(key, status, text);
    spinner.finish_using_style();
}
