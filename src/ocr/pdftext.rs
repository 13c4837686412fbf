//! An "OCR" engine that reads the text layer of a PDF.
//!
//! This will miss any "non-searchable" text in a PDF, but sometimes you just
//! want cheap and fast, or you want to try things out without an API key.

use lopdf::{Document, Object, ObjectId, content::Content};

use super::{DocumentDescriptor, OcrResponse, OcrService, PageText};
use crate::{
    async_utils::spawn_blocking_propagating_panics, data_url::decode_data_url,
    prelude::*,
};

/// "OCR" engine which extracts text-drawing operators from PDF pages.
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct PdfTextOcrService {
    client: reqwest::Client,
}

impl PdfTextOcrService {
    /// Create a new `pdftext` engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the bytes of a document, either from a `data:` URL or over HTTP.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if url.starts_with("data:") {
            let (mime_type, data) = decode_data_url(url)?;
            if mime_type != "application/pdf" {
                return Err(anyhow!("pdftext only works with PDFs, not {mime_type}"));
            }
            return Ok(data);
        }
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed to download {url}"))?
            .error_for_status()
            .with_context(|| format!("failed to download {url}"))?;
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("failed to read {url}"))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl OcrService for PdfTextOcrService {
    #[instrument(level = "debug", skip_all)]
    async fn process(&self, document: &DocumentDescriptor) -> Result<OcrResponse> {
        if let DocumentDescriptor::ImageUrl { .. } = document {
            return Err(anyhow!("pdftext only works with PDFs, not images"));
        }
        let pdf = self.fetch(document.url()).await?;
        let pages = spawn_blocking_propagating_panics(move || extract_pages(&pdf)).await?;
        Ok(OcrResponse::from_pages(pages))
    }
}

/// Extract the text of each page of a PDF, in order.
fn extract_pages(pdf: &[u8]) -> Result<Vec<PageText>> {
    let doc = Document::load_mem(pdf).context("could not parse PDF")?;
    doc.get_pages()
        .into_iter()
        .map(|(page_number, page_id)| {
            let markdown = page_text(&doc, page_id)
                .with_context(|| format!("could not read text on page {page_number}"))?;
            Ok(PageText { markdown })
        })
        .collect()
}

/// Collect the strings drawn by text operators on a page, one per line.
///
/// Strings are decoded as UTF-8 (lossily), ignoring font encodings. That's
/// right for ASCII text and good enough for a quick look at anything else.
fn page_text(doc: &Document, page_id: ObjectId) -> Result<String> {
    let content = Content::decode(&doc.get_page_content(page_id)?)?;
    let mut lines = vec![];
    for operation in content.operations {
        match operation.operator.as_str() {
            "Tj" | "'" | "\"" => {
                if let Some(Object::String(bytes, _)) = operation.operands.last() {
                    lines.push(String::from_utf8_lossy(bytes).into_owned());
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operation.operands.first() {
                    let line = items
                        .iter()
                        .filter_map(|item| match item {
                            Object::String(bytes, _) => {
                                Some(String::from_utf8_lossy(bytes).into_owned())
                            }
                            _ => None,
                        })
                        .collect::<String>();
                    lines.push(line);
                }
            }
            _ => {}
        }
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{document::FileType, ocr::NO_RESULT, test_util::make_pdf};

    #[tokio::test]
    async fn inline_pdf_yields_one_page_per_page() -> Result<()> {
        let pdf = make_pdf(3, 0);
        let document = DocumentDescriptor::for_inline(FileType::Pdf, "application/pdf", &pdf);
        let response = PdfTextOcrService::new().process(&document).await?;
        assert_eq!(response.to_text(), "Page 1\n\nPage 2\n\nPage 3");
        Ok(())
    }

    #[tokio::test]
    async fn zero_page_pdf_is_empty() -> Result<()> {
        let pdf = make_pdf(0, 0);
        let document = DocumentDescriptor::for_inline(FileType::Pdf, "application/pdf", &pdf);
        let response = PdfTextOcrService::new().process(&document).await?;
        assert_eq!(response.to_text(), NO_RESULT);
        Ok(())
    }

    #[tokio::test]
    async fn images_and_garbage_are_errors() {
        let service = PdfTextOcrService::new();
        let image = DocumentDescriptor::for_inline(FileType::Image, "image/png", b"png");
        assert!(service.process(&image).await.is_err());

        let garbage =
            DocumentDescriptor::for_inline(FileType::Pdf, "application/pdf", b"not a pdf");
        let err = service.process(&garbage).await.unwrap_err();
        assert!(format!("{err:#}").contains("could not parse PDF"));
    }

    #[tokio::test]
    async fn unreachable_url_is_an_error() {
        let document = DocumentDescriptor::for_url(FileType::Pdf, "http://127.0.0.1:9/a.pdf");
        let err = PdfTextOcrService::new().process(&document).await.unwrap_err();
        assert!(format!("{err:#}").contains("failed to download"));
    }
}
