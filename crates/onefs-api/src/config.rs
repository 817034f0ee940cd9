// ── Runtime connection configuration ──
//
// These types describe *how* to connect to a cluster. They carry credential
// data and connection tuning, but never touch disk. `onefs-config` (or any
// other front end) builds a `ClientConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use tracing::warn;

/// Default root under which volume directories are created.
pub const DEFAULT_VOLUMES_PATH: &str = "/ifs/volumes";
/// Default permission string applied to new volume directories.
pub const DEFAULT_VOLUMES_PATH_PERMISSIONS: &str = "0777";

/// How requests are authenticated. Fixed for the lifetime of a client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthMode {
    /// HTTP basic auth on every request.
    #[default]
    Basic,
    /// Cookie + CSRF token obtained from the session endpoint.
    SessionBased,
}

impl AuthMode {
    /// Map the raw configuration value (0 = basic, 1 = session).
    ///
    /// Any other value falls back to [`AuthMode::Basic`] with a warning.
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            0 => Self::Basic,
            1 => Self::SessionBased,
            other => {
                warn!(auth_mode = other, "unknown auth mode, falling back to basic auth");
                Self::Basic
            }
        }
    }
}

/// How much of each request/response the diagnostic dump prints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Request line and response status only.
    #[default]
    Low,
    /// Adds headers.
    Medium,
    /// Adds bodies.
    High,
}

impl Verbosity {
    /// Map the raw configuration value (0 = high, 1 = medium, 2 = low).
    ///
    /// Any other value falls back to [`Verbosity::Low`] with a warning.
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            0 => Self::High,
            1 => Self::Medium,
            2 => Self::Low,
            other => {
                warn!(verbosity = other, "unknown verbosity level, using low");
                Self::Low
            }
        }
    }
}

/// TLS protocol versions the client can be pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    Tls12,
    Tls13,
}

impl TlsVersion {
    pub(crate) fn to_reqwest(self) -> reqwest::tls::Version {
        match self {
            Self::Tls12 => reqwest::tls::Version::TLS_1_2,
            Self::Tls13 => reqwest::tls::Version::TLS_1_3,
        }
    }

    pub(crate) fn to_rustls(self) -> &'static rustls::SupportedProtocolVersion {
        match self {
            Self::Tls12 => &rustls::version::TLS12,
            Self::Tls13 => &rustls::version::TLS13,
        }
    }
}

/// Certificate verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// Built-in root store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file (PEM).
    CustomCa(PathBuf),
    /// Skip verification (self-signed cluster certificates).
    DangerAcceptInvalid,
}

/// TLS policy for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    pub verification: TlsVerification,
    pub min_version: TlsVersion,
    pub max_version: TlsVersion,
    /// Restrict the handshake to these cipher suites, named the way rustls
    /// names them (e.g. `TLS13_AES_256_GCM_SHA384`). `None` keeps the
    /// provider's default set.
    pub cipher_suites: Option<Vec<String>>,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            verification: TlsVerification::SystemDefaults,
            min_version: TlsVersion::Tls12,
            max_version: TlsVersion::Tls13,
            cipher_suites: None,
        }
    }
}

impl TlsConfig {
    /// Default versions with certificate verification turned off.
    pub fn insecure() -> Self {
        Self {
            verification: TlsVerification::DangerAcceptInvalid,
            ..Self::default()
        }
    }
}

/// Configuration for connecting to a single cluster.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base endpoint, e.g. `https://cluster.example.com:8080`.
    pub endpoint: String,
    pub username: String,
    pub password: SecretString,
    /// Group the user acts as; informational, exposed via `Client::group`.
    pub group: String,
    pub auth_mode: AuthMode,
    pub tls: TlsConfig,
    /// Timeout applied to each whole round trip.
    pub timeout: Duration,
    /// Root directory under which volumes live.
    pub volumes_path: String,
    /// Permission string applied to new volume directories.
    pub volumes_path_permissions: String,
    /// Tolerate client host names that do not resolve when building exports.
    pub ignore_unresolvable_hosts: bool,
    pub verbosity: Verbosity,
}

impl ClientConfig {
    /// A config with defaults for everything but endpoint and credentials.
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: SecretString,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password,
            group: String::new(),
            auth_mode: AuthMode::Basic,
            tls: TlsConfig::default(),
            timeout: Duration::from_secs(30),
            volumes_path: DEFAULT_VOLUMES_PATH.into(),
            volumes_path_permissions: DEFAULT_VOLUMES_PATH_PERMISSIONS.into(),
            ignore_unresolvable_hosts: false,
            verbosity: Verbosity::Low,
        }
    }

    #[must_use]
    pub fn with_auth_mode(mut self, auth_mode: AuthMode) -> Self {
        self.auth_mode = auth_mode;
        self
    }

    #[must_use]
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
