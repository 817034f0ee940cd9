// Diagnostic request/response dumps.
//
// Emitted at debug level under the `onefs_api::dump` target. Secrets are
// masked before anything is formatted: credential headers and any JSON
// field named `password`.

use std::fmt::Write as _;

use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde_json::Value;
use tracing::debug;

use crate::config::Verbosity;

const MASK: &str = "******";

const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie", "x-csrf-token"];
const SENSITIVE_FIELDS: &[&str] = &["password"];

/// Log an outgoing request at the given verbosity.
pub fn request(
    verbosity: Verbosity,
    method: &reqwest::Method,
    url: &url::Url,
    headers: &HeaderMap,
    body: Option<&[u8]>,
) {
    if !tracing::enabled!(target: "onefs_api::dump", tracing::Level::DEBUG) {
        return;
    }
    let text = render(&format!("{method} {url}"), verbosity, headers, body);
    debug!(target: "onefs_api::dump", "request:\n{text}");
}

/// Log a received response at the given verbosity.
pub fn response(verbosity: Verbosity, status: StatusCode, headers: &HeaderMap, body: &[u8]) {
    if !tracing::enabled!(target: "onefs_api::dump", tracing::Level::DEBUG) {
        return;
    }
    let text = render(&status.to_string(), verbosity, headers, Some(body));
    debug!(target: "onefs_api::dump", "response:\n{text}");
}

/// Format a dump: first line, then headers (medium+), then body (high).
pub fn render(first_line: &str, verbosity: Verbosity, headers: &HeaderMap, body: Option<&[u8]>) -> String {
    let mut out = String::from(first_line);
    if verbosity >= Verbosity::Medium {
        for (name, value) in headers {
            let shown = if is_sensitive_header(name.as_str()) {
                MASK
            } else {
                value.to_str().unwrap_or("<binary>")
            };
            let _ = write!(out, "\n{name}: {shown}");
        }
    }
    if verbosity >= Verbosity::High {
        if let Some(body) = body.filter(|b| !b.is_empty()) {
            out.push_str("\n\n");
            out.push_str(&redact_body(body));
        }
    }
    out
}

fn is_sensitive_header(name: &str) -> bool {
    SENSITIVE_HEADERS.iter().any(|s| name.eq_ignore_ascii_case(s))
}

/// Mask sensitive JSON fields; summarize non-text bodies.
pub fn redact_body(body: &[u8]) -> String {
    if let Ok(mut value) = serde_json::from_slice::<Value>(body) {
        redact_value(&mut value);
        return value.to_string();
    }
    match std::str::from_utf8(body) {
        Ok(text) => text.to_owned(),
        Err(_) => format!("<{} bytes of binary data>", body.len()),
    }
}

fn redact_value(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if SENSITIVE_FIELDS.iter().any(|s| key.eq_ignore_ascii_case(s)) {
                    *field = Value::String(MASK.into());
                } else {
                    redact_value(field);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_value),
        _ => {}
    }
}
