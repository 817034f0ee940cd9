// Structured API errors and the non-2xx response decoder.
//
// The cluster answers application-level failures with a JSON multi-error
// document and infrastructure-level failures with an HTML page. Which one
// is decoded depends on `Content-Type` alone; the body is never sniffed.

use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Error;

/// One entry of the `errors` array in a JSON error document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub message: String,
}

/// A JSON multi-error response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", self.message())]
pub struct JsonError {
    pub status_code: u16,
    /// Status line of the response, e.g. `404 Not Found`.
    pub status_line: String,
    pub errors: Vec<ErrorDetail>,
}

impl JsonError {
    pub fn new(status_code: u16, status_line: impl Into<String>, errors: Vec<ErrorDetail>) -> Self {
        Self {
            status_code,
            status_line: status_line.into(),
            errors,
        }
    }

    /// First entry's message, or the status line when that is empty.
    pub fn message(&self) -> &str {
        match self.errors.first() {
            Some(detail) if !detail.message.is_empty() => &detail.message,
            _ => &self.status_line,
        }
    }
}

/// An HTML error page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HtmlError {
    pub status_code: u16,
    /// Text of the first `<h1>`, else the `<title>`, else empty.
    pub message: String,
}

/// Structured error decoded from a non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error(transparent)]
    Json(JsonError),
    #[error(transparent)]
    Html(HtmlError),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Json(e) => e.status_code,
            Self::Html(e) => e.status_code,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Json(e) => e.message(),
            Self::Html(e) => &e.message,
        }
    }
}

#[derive(Deserialize)]
struct ErrorDocument {
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

/// Status line in the `<code> <reason>` form, e.g. `401 Unauthorized`.
pub(crate) fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {reason}", status.as_u16()),
        None => status.as_u16().to_string(),
    }
}

fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|media| media.trim().eq_ignore_ascii_case("text/html"))
}

/// Decode a non-2xx response into an [`Error`].
///
/// Returns [`Error::Api`] for either shape, or [`Error::Deserialization`]
/// when a non-HTML body is not a valid JSON error document. An empty body
/// decodes to a JSON error with no entries.
pub fn decode_error(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> Error {
    if is_html(headers) {
        let page = String::from_utf8_lossy(body);
        return Error::Api(ApiError::Html(HtmlError {
            status_code: status.as_u16(),
            message: html_message(&page),
        }));
    }

    let errors = if body.iter().all(u8::is_ascii_whitespace) {
        Vec::new()
    } else {
        match serde_json::from_slice::<ErrorDocument>(body) {
            Ok(doc) => doc.errors,
            Err(e) => return Error::deserialization(&e, body),
        }
    };

    Error::Api(ApiError::Json(JsonError::new(
        status.as_u16(),
        status_line(status),
        errors,
    )))
}

fn html_message(page: &str) -> String {
    let doc = Html::parse_document(page);
    first_text(&doc, "h1")
        .or_else(|| first_text(&doc, "title"))
        .unwrap_or_default()
}

fn first_text(doc: &Html, tag: &str) -> Option<String> {
    let selector = Selector::parse(tag).ok()?;
    let element = doc.select(&selector).next()?;
    let text: String = element.text().collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_owned())
}
