// OneFS platform API client.
//
// Bundles the shared transport, the retry coordinator, and the values
// discovered or fixed at construction. Every call is blocking and maps to
// one request (two when a session has to be renewed).

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::auth::{Authenticate, Credentials, HttpAuthenticator};
use crate::config::{AuthMode, ClientConfig};
use crate::dispatch::{Dispatch, HttpDispatcher, Reply};
use crate::error::Error;
use crate::params::OrderedParams;
use crate::request::Request;
use crate::retry::RetryCoordinator;
use crate::session::Session;
use crate::transport::{TransportConfig, build_runtime};
use crate::version::{ApiVersion, LATEST_PATH, LatestResponse};

/// Values fixed at construction and exposed through accessors.
#[derive(Debug, Clone)]
struct Settings {
    username: String,
    group: String,
    auth_mode: AuthMode,
    volumes_path: String,
    volumes_path_permissions: String,
    ignore_unresolvable_hosts: bool,
}

impl Settings {
    fn from_config(config: &ClientConfig) -> Self {
        Self {
            username: config.username.clone(),
            group: config.group.clone(),
            auth_mode: config.auth_mode,
            volumes_path: config.volumes_path.clone(),
            volumes_path_permissions: config.volumes_path_permissions.clone(),
            ignore_unresolvable_hosts: config.ignore_unresolvable_hosts,
        }
    }
}

/// Blocking client for the OneFS platform and namespace APIs.
///
/// `Client` is `Send + Sync`; share it behind an `Arc` to issue calls from
/// several threads over one connection pool.
#[derive(Debug)]
pub struct Client {
    coordinator: RetryCoordinator,
    settings: Settings,
    api_version: ApiVersion,
}

impl Client {
    /// Connect to a cluster.
    ///
    /// Validates the config, builds the transport, logs in (session mode),
    /// and discovers the API version. Fails if the cluster's major version
    /// is older than [`MIN_MAJOR_VERSION`](crate::version::MIN_MAJOR_VERSION).
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        validate(&config)?;

        let http = TransportConfig::new(config.tls.clone(), config.timeout).build_client()?;
        let runtime = build_runtime()?;
        let credentials = match config.auth_mode {
            AuthMode::Basic => Credentials::Basic {
                username: config.username.clone(),
                password: config.password.clone(),
            },
            AuthMode::SessionBased => Credentials::Session,
        };
        let dispatcher = Arc::new(HttpDispatcher::new(
            runtime,
            http,
            config.endpoint.clone(),
            credentials,
            config.verbosity,
            config.timeout,
        ));

        let coordinator = match config.auth_mode {
            AuthMode::Basic => RetryCoordinator::direct(dispatcher),
            AuthMode::SessionBased => {
                let authenticator = Arc::new(HttpAuthenticator::new(
                    Arc::clone(&dispatcher),
                    config.username.clone(),
                    config.password.clone(),
                ));
                let coordinator = RetryCoordinator::guarded(dispatcher, authenticator);
                coordinator.authenticate()?;
                coordinator
            }
        };

        let api_version = discover_version(&coordinator)?;
        info!(endpoint = %config.endpoint, %api_version, "connected to cluster");

        Ok(Self {
            coordinator,
            settings: Settings::from_config(&config),
            api_version,
        })
    }

    /// Build a client around injected dispatch and authentication.
    ///
    /// Skips the network entirely: no login, no version discovery. When
    /// `authenticator` is `Some` the client behaves as session-based and
    /// logs in lazily on the first 401.
    pub fn with_parts(
        config: &ClientConfig,
        dispatcher: Arc<dyn Dispatch>,
        authenticator: Option<Arc<dyn Authenticate>>,
        api_version: ApiVersion,
    ) -> Self {
        let (coordinator, auth_mode) = match authenticator {
            Some(authenticator) => (
                RetryCoordinator::guarded(dispatcher, authenticator),
                AuthMode::SessionBased,
            ),
            None => (RetryCoordinator::direct(dispatcher), AuthMode::Basic),
        };
        let mut settings = Settings::from_config(config);
        settings.auth_mode = auth_mode;
        Self {
            coordinator,
            settings,
            api_version,
        }
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Execute `request` and decode a JSON response body.
    ///
    /// Returns `Ok(None)` for an empty 2xx body.
    pub fn execute<T: DeserializeOwned>(&self, request: &Request) -> Result<Option<T>, Error> {
        let reply = self.coordinator.execute(request)?;
        decode_reply(&reply)
    }

    /// Execute `request` and discard any response body.
    pub fn execute_unit(&self, request: &Request) -> Result<(), Error> {
        self.coordinator.execute(request).map(|_| ())
    }

    /// Execute `request` and return the raw 2xx response.
    pub fn execute_raw(&self, request: &Request) -> Result<Reply, Error> {
        self.coordinator.execute(request)
    }

    pub fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        id: &str,
        params: OrderedParams,
    ) -> Result<Option<T>, Error> {
        debug!(path, id, "GET");
        self.execute(&Request::get(path).with_id(id).with_params(params))
    }

    pub fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        id: &str,
        params: OrderedParams,
        body: &B,
    ) -> Result<Option<T>, Error> {
        debug!(path, id, "POST");
        let request = Request::post(path)
            .with_id(id)
            .with_params(params)
            .with_json(body)?;
        self.execute(&request)
    }

    pub fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        id: &str,
        params: OrderedParams,
        body: &B,
    ) -> Result<Option<T>, Error> {
        debug!(path, id, "PUT");
        let request = Request::put(path)
            .with_id(id)
            .with_params(params)
            .with_json(body)?;
        self.execute(&request)
    }

    pub fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        id: &str,
        params: OrderedParams,
    ) -> Result<Option<T>, Error> {
        debug!(path, id, "DELETE");
        self.execute(&Request::delete(path).with_id(id).with_params(params))
    }

    // ── Session ──────────────────────────────────────────────────────

    /// Log in again now. A no-op for basic-auth clients.
    pub fn authenticate(&self) -> Result<(), Error> {
        self.coordinator.authenticate().map(|_| ())
    }

    /// Snapshot of the current session.
    pub fn session(&self) -> Arc<Session> {
        self.coordinator.session()
    }

    /// Replace the current session (e.g. one restored by the caller).
    pub fn set_session(&self, session: Session) {
        self.coordinator.set_session(session);
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn api_version(&self) -> ApiVersion {
        self.api_version
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.settings.auth_mode
    }

    pub fn user(&self) -> &str {
        &self.settings.username
    }

    pub fn group(&self) -> &str {
        &self.settings.group
    }

    pub fn volumes_path(&self) -> &str {
        &self.settings.volumes_path
    }

    /// Path of the volume directory `name` under the volumes root.
    pub fn volume_path(&self, name: &str) -> String {
        format!("{}/{name}", self.settings.volumes_path.trim_end_matches('/'))
    }

    pub fn volumes_path_permissions(&self) -> &str {
        &self.settings.volumes_path_permissions
    }

    pub fn ignore_unresolvable_hosts(&self) -> bool {
        self.settings.ignore_unresolvable_hosts
    }
}

fn validate(config: &ClientConfig) -> Result<(), Error> {
    use secrecy::ExposeSecret;

    if config.endpoint.trim().is_empty() {
        return Err(Error::MissingConfig { field: "endpoint" });
    }
    if config.username.is_empty() {
        return Err(Error::MissingConfig { field: "username" });
    }
    if config.password.expose_secret().is_empty() {
        return Err(Error::MissingConfig { field: "password" });
    }
    Ok(())
}

fn discover_version(coordinator: &RetryCoordinator) -> Result<ApiVersion, Error> {
    let reply = coordinator.execute(&Request::get(LATEST_PATH))?;
    let latest: LatestResponse = decode_reply(&reply)?.unwrap_or_default();
    latest.into_version()
}

/// Decode a 2xx body as JSON; an empty body is `None`.
fn decode_reply<T: DeserializeOwned>(reply: &Reply) -> Result<Option<T>, Error> {
    if reply.body.is_empty() {
        return Ok(None);
    }
    serde_json::from_slice(&reply.body)
        .map(Some)
        .map_err(|e| Error::deserialization(&e, &reply.body))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::new("https://cluster:8080", "admin", SecretString::from("pw".to_owned()))
    }

    #[test]
    fn missing_fields_fail_validation() {
        let mut cfg = config();
        cfg.endpoint = String::new();
        assert!(matches!(Client::new(cfg), Err(Error::MissingConfig { field: "endpoint" })));

        let mut cfg = config();
        cfg.username = String::new();
        assert!(matches!(Client::new(cfg), Err(Error::MissingConfig { field: "username" })));

        let mut cfg = config();
        cfg.password = SecretString::from(String::new());
        assert!(matches!(Client::new(cfg), Err(Error::MissingConfig { field: "password" })));
    }

    #[test]
    fn volume_path_joins_under_root() {
        struct Never;
        impl Dispatch for Never {
            fn dispatch(&self, _: &Request, _: &Session) -> Result<Reply, Error> {
                Err(Error::Cancelled)
            }
        }

        let mut cfg = config();
        cfg.volumes_path = "/ifs/data/csi/".into();
        cfg.group = "storage".into();
        let client = Client::with_parts(&cfg, Arc::new(Never), None, ApiVersion::new(8, 1));

        assert_eq!(client.volume_path("vol1"), "/ifs/data/csi/vol1");
        assert_eq!(client.user(), "admin");
        assert_eq!(client.group(), "storage");
        assert_eq!(client.auth_mode(), AuthMode::Basic);
        assert_eq!(client.api_version().to_string(), "8.1");
    }

    #[test]
    fn empty_body_decodes_to_none() {
        let reply = Reply {
            status: reqwest::StatusCode::NO_CONTENT,
            headers: reqwest::header::HeaderMap::new(),
            body: bytes::Bytes::new(),
        };
        let decoded: Option<serde_json::Value> = decode_reply(&reply).unwrap();
        assert!(decoded.is_none());
    }
}
