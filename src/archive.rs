//! Packaging results for display and download.
//!
//! Every result becomes a `<key>.txt` file, both inside a combined ZIP archive
//! and as an individual download. Downloads are `data:` URLs, so the HTML
//! report we generate is a single self-contained file.

use std::{
    collections::HashSet,
    io::{Cursor, Write as _},
};

use handlebars::Handlebars;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::{
    data_url::data_url,
    prelude::*,
    process::{OcrResult, ResultStore},
};

/// File name of the combined archive.
pub const ARCHIVE_FILE_NAME: &str = "ocr_results.zip";

/// MIME type used for individual text downloads.
const TEXT_MIME_TYPE: &str = "text/plain";

/// MIME type used for the combined archive.
const ZIP_MIME_TYPE: &str = "application/zip";

/// Template for our HTML report. Handlebars escapes `{{...}}` for us.
const REPORT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>OCR Results</title>
</head>
<body>
<h1>OCR Results</h1>
{{#each files}}
<section>
<h2>{{key}}</h2>
<pre>{{text}}</pre>
<p><a href="{{data_url}}" download="{{file_name}}">Download {{key}} OCR Result</a></p>
</section>
{{/each}}
<p><a href="{{archive.data_url}}" download="{{archive.file_name}}">Download All Results</a></p>
</body>
</html>
"#;

/// The archive entry (and download) name for a result key.
pub fn text_file_name(key: &str) -> String {
    format!("{key}.txt")
}

/// Make `name` safe to use as a single path component on common
/// filesystems. ZIP entries keep the original name.
pub fn sanitize_file_name(name: &str) -> String {
    let sanitized = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>();
    match sanitized.trim_matches('.') {
        "" => "_".to_owned(),
        _ => sanitized,
    }
}

/// Pick a local `.txt` file name for each result, in order.
///
/// Distinct keys can sanitize to the same name (`a/b` and `a_b`), so later
/// collisions get a ` (2)`, ` (3)`, ... suffix. Names are compared without
/// case, since some filesystems ignore it.
pub fn output_file_names(results: &ResultStore) -> Vec<(String, &OcrResult)> {
    let mut used = HashSet::new();
    results
        .iter()
        .map(|result| {
            let base = sanitize_file_name(&result.key);
            let mut name = text_file_name(&base);
            let mut n = 1;
            while !used.insert(name.to_lowercase()) {
                n += 1;
                name = text_file_name(&format!("{base} ({n})"));
            }
            (name, result)
        })
        .collect()
}

/// Render results for display, as Markdown.
pub fn render_display(results: &ResultStore) -> String {
    let mut out = String::new();
    for result in results.iter() {
        out.push_str(&format!("**{}**\n\n{}\n\n", result.key, result.text));
    }
    out
}

/// Build a ZIP archive with one `<key>.txt` entry per result.
#[instrument(level = "debug", skip_all, fields(count = results.len()))]
pub fn build_zip(results: &ResultStore) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for result in results.iter() {
        let name = text_file_name(&result.key);
        zip.start_file(name.as_str(), options)
            .with_context(|| format!("failed to add {name:?} to archive"))?;
        zip.write_all(result.text.as_bytes())
            .with_context(|| format!("failed to write {name:?} to archive"))?;
    }
    let cursor = zip.finish().context("failed to finish archive")?;
    Ok(cursor.into_inner())
}

/// A downloadable file, encoded as a `data:` URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Download {
    /// Suggested file name.
    pub file_name: String,

    /// The file contents, as a `data:` URL.
    pub data_url: String,
}

/// A text download for a single result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResultDownload {
    /// The result key.
    pub key: String,

    /// The result text.
    pub text: String,

    /// The text as a download.
    #[serde(flatten)]
    pub download: Download,
}

impl ResultDownload {
    fn new(result: &OcrResult) -> Self {
        Self {
            key: result.key.clone(),
            text: result.text.clone(),
            download: Download {
                file_name: text_file_name(&result.key),
                data_url: data_url(TEXT_MIME_TYPE, result.text.as_bytes()),
            },
        }
    }
}

/// All the downloads for a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Downloads {
    /// One download per result.
    pub files: Vec<ResultDownload>,

    /// Every result, bundled into a ZIP archive.
    pub archive: Download,
}

impl Downloads {
    /// Build downloads for every result in `results`. `zip` should be the
    /// output of [`build_zip`] for the same results.
    pub fn new(results: &ResultStore, zip: &[u8]) -> Self {
        Self {
            files: results.iter().map(ResultDownload::new).collect(),
            archive: Download {
                file_name: ARCHIVE_FILE_NAME.to_owned(),
                data_url: data_url(ZIP_MIME_TYPE, zip),
            },
        }
    }

    /// Render a self-contained HTML page showing each result with a download
    /// link, plus a link to download everything.
    pub fn render_html_report(&self) -> Result<String> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars
            .register_template_string("report", REPORT_TEMPLATE)
            .context("invalid report template")?;
        handlebars
            .render("report", self)
            .context("failed to render report")
    }
}
