//! CLI error types with miette diagnostics.
//!
//! Maps `onefs_api::Error` and `ConfigError` into user-facing errors with
//! actionable help text and a stable exit code.

use miette::Diagnostic;
use thiserror::Error;

use onefs_config::ConfigError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to cluster at {endpoint}")]
    #[diagnostic(
        code(onefs::connection_failed),
        help(
            "Check that the cluster is reachable and the endpoint includes the port.\n\
             Endpoint: {endpoint}"
        )
    )]
    ConnectionFailed {
        endpoint: String,
        #[source]
        source: onefs_api::Error,
    },

    #[error("TLS setup failed: {reason}")]
    #[diagnostic(
        code(onefs::tls_error),
        help(
            "Clusters usually present a self-signed certificate.\n\
             Use --insecure (-k) to accept it, or set ca_cert in your profile."
        )
    )]
    Tls { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(
        code(onefs::auth_failed),
        help("Verify the username and password, or try --auth-mode basic.")
    )]
    AuthFailed { message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(onefs::no_credentials),
        help(
            "Set username and password in the profile, store the password in the\n\
             system keyring under service 'onefs', or set ONEFS_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("Not found: {message}")]
    #[diagnostic(code(onefs::not_found))]
    NotFound { message: String },

    #[error("API error (HTTP {status}): {message}")]
    #[diagnostic(code(onefs::api_error))]
    Api { status: u16, message: String },

    #[error("Request timed out after {}", humantime::format_duration(*after))]
    #[diagnostic(
        code(onefs::timeout),
        help("Increase the timeout with --timeout or check cluster responsiveness.")
    )]
    Timeout { after: std::time::Duration },

    #[error(transparent)]
    #[diagnostic(code(onefs::client))]
    Client(onefs_api::Error),

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(onefs::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(onefs::profile_not_found),
        help("Add a [profiles.{name}] table to {path}")
    )]
    ProfileNotFound { name: String, path: String },

    #[error("No cluster endpoint configured")]
    #[diagnostic(
        code(onefs::no_config),
        help(
            "Pass --endpoint, set ONEFS_ENDPOINT, or create a profile.\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(onefs::config))]
    Config(ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(onefs::json), help("Check the request body and try again."))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Tls { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Wrap a client error, naming the endpoint when it could not be reached.
    pub fn from_client(err: onefs_api::Error, endpoint: &str) -> Self {
        if err.is_connect() {
            return Self::ConnectionFailed {
                endpoint: endpoint.to_owned(),
                source: err,
            };
        }
        err.into()
    }
}

// ── onefs_api::Error → CliError mapping ──────────────────────────────

impl From<onefs_api::Error> for CliError {
    fn from(err: onefs_api::Error) -> Self {
        use onefs_api::Error;

        if err.is_auth_error() || err.is_unauthorized() {
            return Self::AuthFailed {
                message: err.to_string(),
            };
        }
        if err.is_not_found() {
            return Self::NotFound {
                message: err.to_string(),
            };
        }

        match err {
            Error::Timeout { timeout } => Self::Timeout { after: timeout },
            Error::Tls(reason) => Self::Tls { reason },
            Error::MissingConfig { field } => Self::Validation {
                field: field.into(),
                reason: "must not be empty".into(),
            },
            Error::InvalidHeader(reason) => Self::Validation {
                field: "header".into(),
                reason,
            },
            Error::Api(api) => Self::Api {
                status: api.status_code(),
                message: api.message().to_owned(),
            },
            other if other.is_connect() => Self::ConnectionFailed {
                endpoint: "(unknown)".into(),
                source: other,
            },
            other => Self::Client(other),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::ProfileNotFound { name } => Self::ProfileNotFound {
                name,
                path: onefs_config::config_path().display().to_string(),
            },
            other => Self::Config(other),
        }
    }
}
