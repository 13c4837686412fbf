//! Converting binary data to and from `data:` URLs.
//!
//! Inline uploads are sent to the OCR service as `data:` URLs, and the same
//! encoding is used for the download links in our HTML report.

use std::sync::LazyLock;

use base64::{Engine as _, prelude::BASE64_STANDARD};
use regex::Regex;

use crate::prelude::*;

/// Regex for parsing a `data:` URL.
static DATA_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data:(?P<mime_type>[^;,]+);base64,(?P<data>.*)$")
        .expect("failed to compile regex")
});

/// Convert binary data to a `data:` URL.
pub fn data_url(mime_type: &str, data: &[u8]) -> String {
    let base64_data = BASE64_STANDARD.encode(data);
    format!("data:{};base64,{}", mime_type, base64_data)
}

/// Parse a `data:` URL into a MIME type and Base64-encoded data.
pub fn parse_data_url(data_url: &str) -> Option<(&str, &str)> {
    let caps = DATA_URL_RE.captures(data_url)?;
    let mime_type = caps.name("mime_type")?.as_str();
    let data = caps.name("data")?.as_str();
    Some((mime_type, data))
}

/// Parse a `data:` URL and decode its payload.
pub fn decode_data_url(data_url: &str) -> Result<(String, Vec<u8>)> {
    let (mime_type, data) = parse_data_url(data_url)
        .ok_or_else(|| anyhow!("not a base64 `data:` URL"))?;
    let bytes = BASE64_STANDARD
        .decode(data)
        .context("invalid base64 in `data:` URL")?;
    Ok((mime_type.to_owned(), bytes))
}
