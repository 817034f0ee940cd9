// A logical API call, independent of authentication.
//
// A `Request` is immutable once built so the retry coordinator can replay
// it verbatim after re-authenticating.

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::params::OrderedParams;

/// Content type for raw byte bodies.
pub const OCTET_STREAM: &str = "binary/octet-stream";
/// Content type for structured bodies.
pub const APPLICATION_JSON: &str = "application/json";

/// Request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Body {
    #[default]
    Empty,
    /// Raw bytes sent unmodified.
    Raw(Bytes),
    /// A structured value, already serialized to JSON.
    Json(Bytes),
}

impl Body {
    /// Serialize `value` as a JSON body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, Error> {
        serde_json::to_vec(value)
            .map(|v| Self::Json(Bytes::from(v)))
            .map_err(Error::Serialization)
    }

    pub fn raw(bytes: impl Into<Bytes>) -> Self {
        Self::Raw(bytes.into())
    }

    /// Content type implied by the body kind, if any.
    pub fn default_content_type(&self) -> Option<&'static str> {
        match self {
            Self::Empty => None,
            Self::Raw(_) => Some(OCTET_STREAM),
            Self::Json(_) => Some(APPLICATION_JSON),
        }
    }

    pub fn bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Empty => None,
            Self::Raw(b) | Self::Json(b) => Some(b),
        }
    }
}

/// One logical API call: verb, path, optional resource id, parameters,
/// extra headers, and body.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub id: String,
    pub params: OrderedParams,
    pub headers: HeaderMap,
    pub body: Body,
    pub cancel: Option<CancellationToken>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            id: String::new(),
            params: OrderedParams::new(),
            headers: HeaderMap::new(),
            body: Body::Empty,
            cancel: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_params(mut self, params: OrderedParams) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Serialize `value` as the JSON body.
    pub fn with_json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, Error> {
        Ok(self.with_body(Body::json(value)?))
    }

    /// Add a caller header. A `Content-Type` set here overrides the one
    /// implied by the body.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, Error> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::InvalidHeader(format!("{name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::InvalidHeader(format!("{name}: {e}")))?;
        self.headers.append(name, value);
        Ok(self)
    }

    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Abort the call (before any further round trip) once `token` fires.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Fail with [`Error::Cancelled`] if the caller cancelled this call.
    pub(crate) fn check_cancelled(&self) -> Result<(), Error> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }
}
