// Session authentication.
//
// The login exchange posts credentials to the session endpoint and reads the
// session id and CSRF token back out of `Set-Cookie`. The retry coordinator
// calls it through the `Authenticate` trait so tests can swap it out.

use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::SET_COOKIE;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, warn};

use crate::dispatch::HttpDispatcher;
use crate::error::Error;
use crate::request::Request;
use crate::session::{Session, parse_session_cookies};

/// Path of the session-creation endpoint.
pub const SESSION_PATH: &str = "/session/1/session";

/// Services a session is requested for.
pub const SESSION_SERVICES: [&str; 2] = ["platform", "namespace"];

/// Credentials attached to every dispatched request.
///
/// Basic mode carries the secret material; session mode relies on the
/// session snapshot handed to each dispatch.
#[derive(Debug, Clone)]
pub enum Credentials {
    Basic {
        username: String,
        password: SecretString,
    },
    Session,
}

/// Performs a login and returns the resulting session.
///
/// The returned session is not yet stored; the caller owns that write.
pub trait Authenticate: Send + Sync {
    fn authenticate(&self) -> Result<Session, Error>;
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    services: [&'a str; 2],
    username: &'a str,
    password: &'a str,
}

/// [`Authenticate`] against the cluster's session endpoint.
#[derive(Debug)]
pub struct HttpAuthenticator {
    transport: Arc<HttpDispatcher>,
    username: String,
    password: SecretString,
}

impl HttpAuthenticator {
    /// `transport` must be a session-mode dispatcher so no basic auth is sent.
    pub fn new(transport: Arc<HttpDispatcher>, username: impl Into<String>, password: SecretString) -> Self {
        Self {
            transport,
            username: username.into(),
            password,
        }
    }
}

impl Authenticate for HttpAuthenticator {
    fn authenticate(&self) -> Result<Session, Error> {
        let login = LoginRequest {
            services: SESSION_SERVICES,
            username: &self.username,
            password: self.password.expose_secret(),
        };
        let request = Request::post(SESSION_PATH).with_json(&login)?;

        debug!(username = %self.username, "creating session");
        let reply = self.transport.send(&request, &Session::default())?;

        match reply.status {
            StatusCode::CREATED => {}
            StatusCode::UNAUTHORIZED => return Err(Error::AuthenticationFailed),
            status => {
                let body = String::from_utf8_lossy(&reply.body);
                warn!(status = status.as_u16(), "unexpected login response");
                return Err(Error::Authenticate {
                    status: status.as_u16(),
                    body: body.chars().take(200).collect(),
                });
            }
        }

        let cookies = reply
            .headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok());
        let tokens = parse_session_cookies(cookies).ok_or(Error::SessionTokenMissing)?;

        debug!("session created");
        Ok(Session::from_tokens(&tokens, self.transport.endpoint()))
    }
}
