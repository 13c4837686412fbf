//! Client for the Mistral OCR API.

use std::{env, fmt};

use reqwest::StatusCode;

use super::{DocumentDescriptor, OcrResponse, OcrService, PageText};
use crate::prelude::*;

/// The model we use unless told otherwise.
pub const DEFAULT_MODEL: &str = "mistral-ocr-latest";

/// The API server we talk to unless `MISTRAL_API_BASE` is set.
pub const DEFAULT_API_BASE: &str = "https://api.mistral.ai/v1";

/// Request body for `POST /ocr`.
#[derive(Debug, Serialize)]
struct OcrRequest<'a> {
    model: &'a str,
    document: &'a DocumentDescriptor,
    include_image_base64: bool,
}

/// Response body for `POST /ocr`. We only look at the page text.
#[derive(Debug, Deserialize)]
struct OcrResponseBody {
    #[serde(default)]
    pages: Option<Vec<OcrResponsePage>>,
}

/// A single page in an [`OcrResponseBody`].
#[derive(Debug, Deserialize)]
struct OcrResponsePage {
    #[serde(default)]
    markdown: String,
}

impl From<OcrResponseBody> for OcrResponse {
    fn from(body: OcrResponseBody) -> Self {
        let pages = body
            .pages
            .unwrap_or_default()
            .into_iter()
            .map(|page| PageText {
                markdown: page.markdown,
            })
            .collect();
        OcrResponse::from_pages(pages)
    }
}

/// OCR service backed by the Mistral OCR API.
pub struct MistralOcrService {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

// Hand-written so the API key never ends up in logs.
impl fmt::Debug for MistralOcrService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MistralOcrService")
            .field("api_base", &self.api_base)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

impl MistralOcrService {
    /// Create a new client.
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            api_key: api_key.into(),
            model: model.to_owned(),
        }
    }

    /// Create a new client using `MISTRAL_API_KEY` and (optionally)
    /// `MISTRAL_API_BASE` from the environment.
    pub fn from_env(model: &str) -> Result<Self> {
        let api_key = env::var("MISTRAL_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "MISTRAL_API_KEY must be set (in the environment or a .env file) before processing"
                )
            })?;
        let api_base =
            env::var("MISTRAL_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_owned());
        Ok(Self::new(api_base, api_key, model))
    }

    /// The URL of the OCR endpoint.
    fn ocr_url(&self) -> String {
        format!("{}/ocr", self.api_base.trim_end_matches('/'))
    }
}

/// Describe a non-success HTTP response.
fn status_error(status: StatusCode, body: &str) -> anyhow::Error {
    anyhow!("OCR request failed (status {}): {}", status, body.trim())
}

#[async_trait]
impl OcrService for MistralOcrService {
    #[instrument(level = "debug", skip_all, fields(model = %self.model))]
    async fn process(&self, document: &DocumentDescriptor) -> Result<OcrResponse> {
        let request = OcrRequest {
            model: &self.model,
            document,
            include_image_base64: true,
        };
        let response = self
            .client
            .post(self.ocr_url())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("failed to send OCR request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let body = response
            .json::<OcrResponseBody>()
            .await
            .context("failed to parse OCR response")?;
        trace!(?body, "OCR response");
        Ok(body.into())
    }
}
