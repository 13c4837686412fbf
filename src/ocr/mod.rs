//! Interface to OCR services.
//!
//! The OCR itself happens elsewhere. Our job is to describe each document in
//! the shape the service expects, and to fold the per-page text it returns
//! into a single result string.

use std::fmt;

use clap::ValueEnum;

use crate::{data_url::data_url, document::FileType, prelude::*};

pub mod mistral;
pub mod pdftext;

/// Result text used when the service returns no pages.
pub const NO_RESULT: &str = "No result found.";

/// Prefix of the result text used when the service call fails.
pub const ERROR_PREFIX: &str = "Error extracting result:";

/// A document to OCR, in the form the service expects.
///
/// Inline uploads are sent as `data:` URLs, so both variants hold a URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentDescriptor {
    /// A PDF document.
    DocumentUrl { document_url: String },

    /// An image.
    ImageUrl { image_url: String },
}

impl DocumentDescriptor {
    /// Describe a remote document.
    pub fn for_url(file_type: FileType, url: impl Into<String>) -> Self {
        let url = url.into();
        match file_type {
            FileType::Pdf => DocumentDescriptor::DocumentUrl { document_url: url },
            FileType::Image => DocumentDescriptor::ImageUrl { image_url: url },
        }
    }

    /// Describe an uploaded document, embedding its contents.
    pub fn for_inline(file_type: FileType, mime_type: &str, data: &[u8]) -> Self {
        Self::for_url(file_type, data_url(mime_type, data))
    }

    /// The URL (possibly a `data:` URL) of this document.
    pub fn url(&self) -> &str {
        match self {
            DocumentDescriptor::DocumentUrl { document_url } => document_url,
            DocumentDescriptor::ImageUrl { image_url } => image_url,
        }
    }
}

/// Text extracted from a single page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageText {
    /// Page text, formatted as Markdown.
    pub markdown: String,
}

/// What the service returned for a document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OcrResponse {
    /// Per-page text, in page order.
    Pages(Vec<PageText>),

    /// Nothing we could extract text from.
    Empty,
}

impl OcrResponse {
    /// Build a response from a list of pages, treating no pages as [`Empty`].
    ///
    /// [`Empty`]: OcrResponse::Empty
    pub fn from_pages(pages: Vec<PageText>) -> Self {
        if pages.is_empty() {
            OcrResponse::Empty
        } else {
            OcrResponse::Pages(pages)
        }
    }

    /// Join our pages into a single result string, separated by blank lines.
    pub fn to_text(&self) -> String {
        match self {
            OcrResponse::Pages(pages) => pages
                .iter()
                .map(|page| page.markdown.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
            OcrResponse::Empty => NO_RESULT.to_owned(),
        }
    }
}

/// Result text for a failed request.
pub fn error_text(err: &anyhow::Error) -> String {
    format!("{ERROR_PREFIX} {err:#}")
}

/// Interface to an OCR service.
#[async_trait]
pub trait OcrService: fmt::Debug + Send + Sync + 'static {
    /// OCR a single document.
    async fn process(&self, document: &DocumentDescriptor) -> Result<OcrResponse>;
}

/// The OCR engines we support.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "snake_case")]
pub enum OcrEngineType {
    /// The Mistral OCR API. Requires `MISTRAL_API_KEY`.
    #[default]
    Mistral,

    /// Read the existing text layer of PDFs, without real OCR. Works offline,
    /// but misses any text that's only present as an image.
    Pdftext,
}

impl OcrEngineType {
    /// Instantiate an appropriate service. This fails if the service needs
    /// credentials we don't have.
    pub fn create_service(&self, model: &str) -> Result<Box<dyn OcrService>> {
        match self {
            OcrEngineType::Mistral => {
                Ok(Box::new(mistral::MistralOcrService::from_env(model)?))
            }
            OcrEngineType::Pdftext => Ok(Box::new(pdftext::PdfTextOcrService::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn descriptors_serialize_to_wire_shape() {
        let pdf = DocumentDescriptor::for_url(FileType::Pdf, "https://example.com/a.pdf");
        assert_eq!(
            serde_json::to_value(&pdf).unwrap(),
            json!({ "type": "document_url", "document_url": "https://example.com/a.pdf" })
        );

        let image = DocumentDescriptor::for_inline(FileType::Image, "image/png", b"hi");
        assert_eq!(
            serde_json::to_value(&image).unwrap(),
            json!({ "type": "image_url", "image_url": "data:image/png;base64,aGk=" })
        );
        assert_eq!(image.url(), "data:image/png;base64,aGk=");
    }

    #[test]
    fn pages_are_joined_with_blank_lines() {
        let response = OcrResponse::from_pages(vec![
            PageText {
                markdown: "# One".to_owned(),
            },
            PageText {
                markdown: "Two".to_owned(),
            },
        ]);
        assert_eq!(response.to_text(), "# One\n\nTwo");
    }

    #[test]
    fn no_pages_is_the_no_result_sentinel() {
        let response = OcrResponse::from_pages(vec![]);
        assert_eq!(response, OcrResponse::Empty);
        assert_eq!(response.to_text(), "No result found.");
    }

    #[test]
    fn error_text_includes_cause_chain() {
        let err = anyhow!("connection refused").context("failed to send OCR request");
        let text = error_text(&err);
        assert!(text.starts_with(ERROR_PREFIX));
        assert!(text.contains("failed to send OCR request: connection refused"));
    }
}
