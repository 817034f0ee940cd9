// Session state for session-based authentication.
//
// The store is read once per dispatch as a whole snapshot, so a request
// never mixes the cookie of one login with the CSRF token of another.
// Writes only happen under the coordinator's login lock.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::warn;

/// Cookie name carrying the session id.
pub const SESSION_COOKIE: &str = "isisessid";
/// Cookie name carrying the anti-CSRF token.
pub const CSRF_COOKIE: &str = "isicsrf";

/// Session state replayed on every authenticated request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Full `isisessid=<token>` pair, sent verbatim as the `Cookie` header.
    pub cookie: String,
    pub csrf_token: String,
    /// Endpoint used at login, sent as the `Referer` header.
    pub referer: String,
    /// Bumped on every store write; 0 means never authenticated.
    pub generation: u64,
}

impl Session {
    /// Build a session from extracted tokens and the login endpoint.
    pub fn from_tokens(tokens: &SessionTokens, referer: impl Into<String>) -> Self {
        Self {
            cookie: format!("{SESSION_COOKIE}={}", tokens.session_id),
            csrf_token: tokens.csrf_token.clone().unwrap_or_default(),
            referer: referer.into(),
            generation: 0,
        }
    }

    /// Whether this session carries a cookie to send.
    pub fn is_authenticated(&self) -> bool {
        !self.cookie.is_empty()
    }
}

/// Tokens extracted from a login response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub session_id: String,
    pub csrf_token: Option<String>,
}

/// Extract session tokens from the `Set-Cookie` header values of a login
/// response.
///
/// Each value is split into `;`-separated `name=value` segments; the first
/// non-empty `isisessid` and `isicsrf` segments win. Returns `None` when no
/// session id is present. A missing CSRF token only logs a warning.
pub fn parse_session_cookies<'a, I>(set_cookie_values: I) -> Option<SessionTokens>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut session_id = None;
    let mut csrf_token = None;

    for value in set_cookie_values {
        for segment in value.split(';') {
            let Some((name, val)) = segment.split_once('=') else {
                continue;
            };
            let val = val.trim();
            if val.is_empty() {
                continue;
            }
            match name.trim() {
                SESSION_COOKIE if session_id.is_none() => session_id = Some(val.to_owned()),
                CSRF_COOKIE if csrf_token.is_none() => csrf_token = Some(val.to_owned()),
                _ => {}
            }
        }
    }

    let session_id = session_id?;
    if csrf_token.is_none() {
        warn!("login response carried no {CSRF_COOKIE} cookie, continuing without CSRF token");
    }
    Some(SessionTokens {
        session_id,
        csrf_token,
    })
}

/// Lock-free holder of the current [`Session`].
#[derive(Debug, Default)]
pub struct SessionStore {
    current: ArcSwap<Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current session as one consistent snapshot.
    pub fn snapshot(&self) -> Arc<Session> {
        self.current.load_full()
    }

    /// Replace the stored session, stamping it with the next generation.
    ///
    /// Callers serialize writes (the retry coordinator holds its login
    /// lock), so the read-then-store here cannot lose an update.
    pub fn replace(&self, mut session: Session) -> Arc<Session> {
        session.generation = self.current.load().generation + 1;
        let session = Arc::new(session);
        self.current.store(Arc::clone(&session));
        session
    }
}
