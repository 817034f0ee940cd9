// Authenticate-then-retry coordination.
//
// Basic-mode clients dispatch once. Session-mode clients dispatch once and,
// on a decoded 401, log in again and replay the request exactly once. The
// second outcome is returned as-is, so a server that keeps rejecting the
// session costs one extra login and one extra request, never a loop.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::auth::Authenticate;
use crate::dispatch::{Dispatch, Reply};
use crate::error::Error;
use crate::request::Request;
use crate::session::{Session, SessionStore};

enum Mode {
    /// Basic auth: no session, no retry.
    Direct,
    /// Session auth: one re-authentication per call on 401.
    Guarded {
        authenticator: Arc<dyn Authenticate>,
        /// Serializes logins and session writes.
        login: Mutex<()>,
    },
}

/// Wraps a [`Dispatch`] with the single re-authentication retry.
pub struct RetryCoordinator {
    dispatcher: Arc<dyn Dispatch>,
    store: SessionStore,
    mode: Mode,
}

impl std::fmt::Debug for RetryCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self.mode {
            Mode::Direct => "direct",
            Mode::Guarded { .. } => "guarded",
        };
        f.debug_struct("RetryCoordinator")
            .field("mode", &mode)
            .field("generation", &self.store.snapshot().generation)
            .finish_non_exhaustive()
    }
}

impl RetryCoordinator {
    /// Coordinator for basic-auth clients.
    pub fn direct(dispatcher: Arc<dyn Dispatch>) -> Self {
        Self {
            dispatcher,
            store: SessionStore::new(),
            mode: Mode::Direct,
        }
    }

    /// Coordinator for session-auth clients. The store starts empty.
    pub fn guarded(dispatcher: Arc<dyn Dispatch>, authenticator: Arc<dyn Authenticate>) -> Self {
        Self {
            dispatcher,
            store: SessionStore::new(),
            mode: Mode::Guarded {
                authenticator,
                login: Mutex::new(()),
            },
        }
    }

    /// Whether this coordinator re-authenticates on 401.
    pub fn is_guarded(&self) -> bool {
        matches!(self.mode, Mode::Guarded { .. })
    }

    /// Current session snapshot (always empty for basic-auth clients).
    pub fn session(&self) -> Arc<Session> {
        self.store.snapshot()
    }

    /// Overwrite the session, e.g. with one persisted by the caller.
    pub fn set_session(&self, session: Session) -> Arc<Session> {
        match &self.mode {
            Mode::Direct => self.store.replace(session),
            Mode::Guarded { login, .. } => {
                let _guard = login.lock().unwrap_or_else(PoisonError::into_inner);
                self.store.replace(session)
            }
        }
    }

    /// Log in unconditionally and store the new session.
    ///
    /// A no-op for basic-auth clients.
    pub fn authenticate(&self) -> Result<Arc<Session>, Error> {
        match &self.mode {
            Mode::Direct => Ok(self.store.snapshot()),
            Mode::Guarded { authenticator, login } => {
                let _guard = login.lock().unwrap_or_else(PoisonError::into_inner);
                let session = authenticator.authenticate()?;
                info!("session established");
                Ok(self.store.replace(session))
            }
        }
    }

    /// Dispatch `request`, re-authenticating and replaying once on 401 in
    /// session mode.
    pub fn execute(&self, request: &Request) -> Result<Reply, Error> {
        let session = self.store.snapshot();
        request.check_cancelled()?;

        let err = match self.dispatcher.dispatch(request, &session) {
            Err(err) if self.is_guarded() && err.is_unauthorized() => err,
            outcome => return outcome,
        };

        debug!(error = %err, "request unauthorized, re-authenticating");
        request.check_cancelled()?;
        let fresh = self
            .refresh(session.generation)
            .map_err(|source| Error::ReauthenticationFailed {
                source: Box::new(source),
            })?;

        request.check_cancelled()?;
        self.dispatcher.dispatch(request, &fresh)
    }

    /// Replace a session that was rejected.
    ///
    /// If another caller already replaced the session this one was using
    /// (`stale_generation` is behind the store), the newer session is reused
    /// without logging in again.
    fn refresh(&self, stale_generation: u64) -> Result<Arc<Session>, Error> {
        let Mode::Guarded { authenticator, login } = &self.mode else {
            return Ok(self.store.snapshot());
        };

        let _guard = login.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.store.snapshot();
        if current.generation > stale_generation {
            debug!(generation = current.generation, "session already refreshed by another caller");
            return Ok(current);
        }

        let session = authenticator.authenticate()?;
        info!("session re-established");
        Ok(self.store.replace(session))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use reqwest::StatusCode;
    use reqwest::header::HeaderMap;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::api_error::{ApiError, HtmlError, JsonError, status_line};
    use crate::session::SessionTokens;

    #[derive(Clone, Copy)]
    enum Outcome {
        Ok,
        Json(u16),
        Html(u16),
    }

    /// Replays a script of outcomes and records the cookie each call carried.
    struct Scripted {
        script: Mutex<VecDeque<Outcome>>,
        cookies: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(script: &[Outcome]) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.iter().copied().collect()),
                cookies: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.cookies.lock().unwrap().clone()
        }
    }

    impl Dispatch for Scripted {
        fn dispatch(&self, _request: &Request, session: &Session) -> Result<Reply, Error> {
            self.cookies.lock().unwrap().push(session.cookie.clone());
            let outcome = self.script.lock().unwrap().pop_front().unwrap_or(Outcome::Json(401));
            match outcome {
                Outcome::Ok => Ok(Reply {
                    status: StatusCode::OK,
                    headers: HeaderMap::new(),
                    body: Bytes::from_static(b"{}"),
                }),
                Outcome::Json(code) => {
                    let status = StatusCode::from_u16(code).unwrap();
                    Err(Error::Api(ApiError::Json(JsonError::new(code, status_line(status), vec![]))))
                }
                Outcome::Html(code) => Err(Error::Api(ApiError::Html(HtmlError {
                    status_code: code,
                    message: "Unauthorized".into(),
                }))),
            }
        }
    }

    /// Counts logins; issues `isisessid=S<n>` or fails with 401.
    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    impl Counting {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Authenticate for Counting {
        fn authenticate(&self) -> Result<Session, Error> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(Error::AuthenticationFailed);
            }
            let tokens = SessionTokens {
                session_id: format!("S{n}"),
                csrf_token: Some(format!("C{n}")),
            };
            Ok(Session::from_tokens(&tokens, "https://cluster:8080"))
        }
    }

    fn guarded(script: &[Outcome], fail_login: bool) -> (RetryCoordinator, Arc<Scripted>, Arc<Counting>) {
        let dispatcher = Scripted::new(script);
        let auth = Counting::new(fail_login);
        let coordinator = RetryCoordinator::guarded(dispatcher.clone(), auth.clone());
        (coordinator, dispatcher, auth)
    }

    #[test]
    fn basic_mode_never_retries() {
        let dispatcher = Scripted::new(&[Outcome::Json(401), Outcome::Ok]);
        let coordinator = RetryCoordinator::direct(dispatcher.clone());

        let err = coordinator.execute(&Request::get("/x")).unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(dispatcher.calls().len(), 1);
        assert_eq!(coordinator.session().generation, 0);
    }

    #[test]
    fn session_mode_retries_once_after_reauth() {
        let (coordinator, dispatcher, auth) = guarded(&[Outcome::Json(401), Outcome::Ok], false);

        let reply = coordinator.execute(&Request::get("/x")).unwrap();

        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(auth.calls(), 1);
        assert_eq!(dispatcher.calls(), vec![String::new(), "isisessid=S1".to_owned()]);
        assert_eq!(coordinator.session().csrf_token, "C1");
    }

    #[test]
    fn persistent_401_is_bounded_to_one_retry() {
        let (coordinator, dispatcher, auth) = guarded(&[Outcome::Json(401), Outcome::Json(401)], false);

        let err = coordinator.execute(&Request::get("/x")).unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(auth.calls(), 1);
        assert_eq!(dispatcher.calls().len(), 2);
    }

    #[test]
    fn html_401_also_triggers_reauth() {
        let (coordinator, _dispatcher, auth) = guarded(&[Outcome::Html(401), Outcome::Ok], false);
        coordinator.execute(&Request::get("/x")).unwrap();
        assert_eq!(auth.calls(), 1);
    }

    #[test]
    fn failed_reauth_is_wrapped_and_not_replayed() {
        let (coordinator, dispatcher, auth) = guarded(&[Outcome::Json(401), Outcome::Ok], true);

        let err = coordinator.execute(&Request::get("/x")).unwrap_err();

        match err {
            Error::ReauthenticationFailed { source } => {
                assert!(matches!(*source, Error::AuthenticationFailed));
            }
            other => panic!("expected ReauthenticationFailed, got: {other:?}"),
        }
        assert_eq!(auth.calls(), 1);
        assert_eq!(dispatcher.calls().len(), 1);
    }

    #[test]
    fn other_failures_pass_through() {
        for outcome in [Outcome::Json(403), Outcome::Json(404), Outcome::Html(500)] {
            let (coordinator, dispatcher, auth) = guarded(&[outcome, Outcome::Ok], false);
            let err = coordinator.execute(&Request::get("/x")).unwrap_err();
            assert!(!err.is_unauthorized());
            assert_eq!(auth.calls(), 0);
            assert_eq!(dispatcher.calls().len(), 1);
        }
    }

    #[test]
    fn cancelled_request_is_not_dispatched() {
        let (coordinator, dispatcher, auth) = guarded(&[Outcome::Ok], false);
        let token = CancellationToken::new();
        token.cancel();

        let err = coordinator
            .execute(&Request::get("/x").with_cancellation(token))
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert!(dispatcher.calls().is_empty());
        assert_eq!(auth.calls(), 0);
    }

    #[test]
    fn stale_refresh_reuses_newer_session() {
        let (coordinator, _dispatcher, auth) = guarded(&[], false);
        let first = coordinator.authenticate().unwrap();
        assert_eq!(first.generation, 1);
        assert_eq!(auth.calls(), 1);

        // A caller that failed with the never-authenticated session finds
        // generation 1 already in place and skips its own login.
        let reused = coordinator.refresh(0).unwrap();
        assert_eq!(reused.cookie, "isisessid=S1");
        assert_eq!(auth.calls(), 1);

        let renewed = coordinator.refresh(1).unwrap();
        assert_eq!(renewed.cookie, "isisessid=S2");
        assert_eq!(auth.calls(), 2);
    }

    /// Rejects unauthenticated calls only once `parties` of them are in
    /// flight together; accepts any logged-in call.
    struct Rendezvous {
        barrier: std::sync::Barrier,
    }

    impl Dispatch for Rendezvous {
        fn dispatch(&self, _request: &Request, session: &Session) -> Result<Reply, Error> {
            if session.is_authenticated() {
                return Ok(Reply {
                    status: StatusCode::OK,
                    headers: HeaderMap::new(),
                    body: Bytes::new(),
                });
            }
            self.barrier.wait();
            let status = StatusCode::UNAUTHORIZED;
            Err(Error::Api(ApiError::Json(JsonError::new(401, status_line(status), vec![]))))
        }
    }

    #[test]
    fn concurrent_401s_share_one_login() {
        let dispatcher = Arc::new(Rendezvous {
            barrier: std::sync::Barrier::new(2),
        });
        let auth = Counting::new(false);
        let coordinator = RetryCoordinator::guarded(dispatcher, auth.clone());

        let results: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..2)
                .map(|_| scope.spawn(|| coordinator.execute(&Request::get("/x"))))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for result in results {
            assert_eq!(result.unwrap().status, StatusCode::OK);
        }
        assert_eq!(auth.calls(), 1);
        assert_eq!(coordinator.session().generation, 1);
    }
}
