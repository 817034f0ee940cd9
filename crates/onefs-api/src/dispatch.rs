// Request dispatcher: one logical request, one HTTP round trip.
//
// Builds the URL, encodes the body, attaches credentials, sends the request
// on the shared client, and reads the response body to the end before
// returning, whatever the outcome. The caller's thread blocks on the
// dispatcher's runtime; a cancelled token drops the in-flight exchange.

use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, StatusCode};
use reqwest::header::{CONTENT_TYPE, COOKIE, HeaderMap, HeaderName, HeaderValue, REFERER};
use secrecy::ExposeSecret;
use tokio::runtime::Runtime;
use tracing::{debug, trace};

use crate::api_error::decode_error;
use crate::auth::Credentials;
use crate::config::Verbosity;
use crate::dump;
use crate::endpoint::build_url;
use crate::error::Error;
use crate::request::Request;
use crate::session::Session;

/// Header carrying the anti-CSRF token in session mode.
pub const CSRF_HEADER: HeaderName = HeaderName::from_static("x-csrf-token");

/// A fully-read HTTP response.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Seam between the retry coordinator and the network.
///
/// Implementations perform exactly one round trip. `Ok` is returned only
/// for 2xx responses; anything else comes back as the decoded error.
pub trait Dispatch: Send + Sync {
    fn dispatch(&self, request: &Request, session: &Session) -> Result<Reply, Error>;
}

/// [`Dispatch`] over a `reqwest` client driven by an owned runtime.
#[derive(Debug)]
pub struct HttpDispatcher {
    runtime: Runtime,
    http: Client,
    endpoint: String,
    credentials: Credentials,
    verbosity: Verbosity,
    timeout: Duration,
}

impl HttpDispatcher {
    pub fn new(
        runtime: Runtime,
        http: Client,
        endpoint: impl Into<String>,
        credentials: Credentials,
        verbosity: Verbosity,
        timeout: Duration,
    ) -> Self {
        Self {
            runtime,
            http,
            endpoint: endpoint.into(),
            credentials,
            verbosity,
            timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send `request` and return the response whatever its status.
    ///
    /// Used directly by the authenticator, which classifies statuses itself.
    pub fn send(&self, request: &Request, session: &Session) -> Result<Reply, Error> {
        request.check_cancelled()?;

        let url = build_url(&self.endpoint, &request.path, &request.id, &request.params)?;
        debug!("{} {}", request.method, url);

        let mut headers = HeaderMap::new();
        if let Some(content_type) = request.body.default_content_type() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        // Caller headers replace body defaults.
        headers.extend(request.headers.clone());

        let mut builder = self.http.request(request.method.clone(), url);
        match &self.credentials {
            Credentials::Basic { username, password } => {
                builder = builder.basic_auth(username, Some(password.expose_secret()));
            }
            Credentials::Session => {
                if session.is_authenticated() {
                    headers.insert(COOKIE, sensitive_value(&session.cookie)?);
                    headers.insert(REFERER, header_value(&session.referer)?);
                    headers.insert(CSRF_HEADER, sensitive_value(&session.csrf_token)?);
                } else {
                    trace!("no session yet, sending unauthenticated");
                }
            }
        }
        builder = builder.headers(headers);
        if let Some(body) = request.body.bytes() {
            builder = builder.body(body.to_vec());
        }

        let http_request = builder.build()?;
        dump::request(
            self.verbosity,
            http_request.method(),
            http_request.url(),
            http_request.headers(),
            request.body.bytes().map(|b| &b[..]),
        );

        let round_trip = async {
            let response = self.http.execute(http_request).await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, headers, body))
        };

        let outcome = match &request.cancel {
            Some(token) => self.runtime.block_on(async {
                tokio::select! {
                    biased;
                    () = token.cancelled() => None,
                    result = round_trip => Some(result),
                }
            }),
            None => Some(self.runtime.block_on(round_trip)),
        };
        let Some(result) = outcome else {
            debug!("{} {} cancelled in flight", request.method, request.path);
            return Err(Error::Cancelled);
        };
        let (status, headers, body) = result.map_err(|e| self.transport_error(e))?;
        dump::response(self.verbosity, status, &headers, &body);

        Ok(Reply {
            status,
            headers,
            body,
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout: self.timeout,
            }
        } else {
            Error::Transport(err)
        }
    }
}

impl Dispatch for HttpDispatcher {
    fn dispatch(&self, request: &Request, session: &Session) -> Result<Reply, Error> {
        let reply = self.send(request, session)?;
        if reply.status.is_success() {
            Ok(reply)
        } else {
            Err(decode_error(reply.status, &reply.headers, &reply.body))
        }
    }
}

fn header_value(value: &str) -> Result<HeaderValue, Error> {
    HeaderValue::from_str(value).map_err(|e| Error::InvalidHeader(e.to_string()))
}

fn sensitive_value(value: &str) -> Result<HeaderValue, Error> {
    let mut value = header_value(value)?;
    value.set_sensitive(true);
    Ok(value)
}
