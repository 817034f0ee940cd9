use std::time::Duration;

use thiserror::Error;

use crate::api_error::ApiError;
use crate::version::ApiVersion;

/// Top-level error type for the `onefs-api` crate.
///
/// Covers every failure mode of the request pipeline: client construction,
/// authentication, transport, body (de)serialization, and the structured
/// errors the cluster returns. Callers branch on the variant to tell
/// "can't log in" apart from "request failed".
#[derive(Debug, Error)]
pub enum Error {
    // ── Construction ────────────────────────────────────────────────
    /// A required configuration field was empty.
    #[error("missing required configuration: {field}")]
    MissingConfig { field: &'static str },

    /// TLS trust store could not be loaded or the HTTP client could not be built.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The I/O runtime behind the blocking API could not be started.
    #[error("failed to start I/O runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// The version-discovery response did not contain a parsable version.
    #[error("invalid API version string: {raw:?}")]
    InvalidVersion { raw: String },

    /// The cluster runs a release older than the minimum supported one.
    #[error("OneFS API version {version} is no longer supported (minimum major version {minimum})")]
    UnsupportedVersion { version: ApiVersion, minimum: u8 },

    // ── Authentication ──────────────────────────────────────────────
    /// The session endpoint rejected the credentials (HTTP 401).
    #[error("authentication failed: invalid username or password")]
    AuthenticationFailed,

    /// Login returned 201 but no `isisessid` cookie was issued.
    #[error("authentication failed: session token missing from login response")]
    SessionTokenMissing,

    /// Login returned a status other than 201 or 401.
    #[error("authenticate error (HTTP {status}): {body}")]
    Authenticate { status: u16, body: String },

    /// A 401 triggered re-authentication, and the login itself failed.
    #[error("re-authentication failed: {source}")]
    ReauthenticationFailed {
        #[source]
        source: Box<Error>,
    },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Request timed out.
    #[error("request timed out after {}", humantime::format_duration(*timeout))]
    Timeout { timeout: Duration },

    /// The caller cancelled the call.
    #[error("request cancelled")]
    Cancelled,

    /// The joined request URL did not parse.
    #[error("invalid URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// A header name or value could not be encoded.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    // ── Data ────────────────────────────────────────────────────────
    /// Serializing a structured request body failed.
    #[error("failed to serialize request body: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── API ─────────────────────────────────────────────────────────
    /// Structured error decoded from a non-2xx response.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl Error {
    /// Build a `Deserialization` error with a short body preview in the message.
    pub(crate) fn deserialization(err: &serde_json::Error, body: &[u8]) -> Self {
        let body = String::from_utf8_lossy(body).into_owned();
        let preview: String = body.chars().take(200).collect();
        Self::Deserialization {
            message: format!("{err} (body preview: {preview:?})"),
            body,
        }
    }

    /// The structured API error, if this is one.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }

    /// HTTP status carried by a structured API error.
    pub fn status_code(&self) -> Option<u16> {
        self.api_error().map(ApiError::status_code)
    }

    /// Returns `true` for a decoded API error with HTTP 401, JSON or HTML.
    ///
    /// This is the only condition that triggers re-authentication.
    pub fn is_unauthorized(&self) -> bool {
        self.status_code() == Some(401)
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    /// Returns `true` if logging in failed, directly or during a retry.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed
                | Self::SessionTokenMissing
                | Self::Authenticate { .. }
                | Self::ReauthenticationFailed { .. }
        )
    }

    /// Returns `true` if the cluster could not be reached at all.
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_connect())
    }

    /// Returns `true` for transport-level timeouts.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Transport(e) => e.is_timeout(),
            _ => false,
        }
    }
}
