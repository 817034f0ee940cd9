//! Shared configuration for OneFS tools.
//!
//! TOML profiles, password resolution (env + keyring + plaintext), and
//! translation to `onefs_api::ClientConfig`. The CLI layers its own flag
//! overrides on top of what this crate produces.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use onefs_api::{AuthMode, ClientConfig, TlsConfig, TlsVerification, TlsVersion, Verbosity};

/// Keyring service name for stored passwords.
pub const KEYRING_SERVICE: &str = "onefs";

/// Environment variable consulted before the keyring.
pub const PASSWORD_ENV: &str = "ONEFS_PASSWORD";

/// Environment variable used when a profile has no username.
pub const USERNAME_ENV: &str = "ONEFS_USERNAME";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found in config")]
    ProfileNotFound { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named explicitly.
    pub default_profile: Option<String>,

    /// Values applied to every profile that does not override them.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named cluster profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile by name, or the default profile when `name` is `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into());
        self.profiles
            .get(&name)
            .map(|profile| (name.clone(), profile))
            .ok_or(ConfigError::ProfileNotFound { name })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default)]
    pub auth_mode: i64,

    #[serde(default)]
    pub insecure: bool,

    /// Request timeout as a humantime string, e.g. `"45s"`.
    #[serde(default = "default_timeout")]
    pub timeout: String,

    /// Dump verbosity: 0 = high, 1 = medium, 2 = low.
    #[serde(default = "default_verbosity")]
    pub verbosity: i64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            auth_mode: 0,
            insecure: false,
            timeout: default_timeout(),
            verbosity: default_verbosity(),
        }
    }
}

fn default_timeout() -> String {
    "30s".into()
}
fn default_verbosity() -> i64 {
    2
}

/// A named cluster profile.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Cluster base URL (e.g., "https://cluster.example.com:8080").
    pub endpoint: String,

    pub username: Option<String>,

    /// Password (plaintext, prefer keyring or env var).
    pub password: Option<String>,

    pub group: Option<String>,

    /// 0 = basic auth, 1 = session-based.
    pub auth_mode: Option<i64>,

    /// Skip certificate verification.
    pub insecure: Option<bool>,

    /// Path to custom CA certificate (PEM).
    pub ca_cert: Option<PathBuf>,

    /// `"1.2"` or `"1.3"`.
    pub min_tls_version: Option<String>,
    pub max_tls_version: Option<String>,

    /// Pin the handshake to these rustls cipher suite names.
    pub cipher_suites: Option<Vec<String>>,

    /// Override timeout (humantime string).
    pub timeout: Option<String>,

    pub volumes_path: Option<String>,
    pub volumes_path_permissions: Option<String>,
    pub ignore_unresolvable_hosts: Option<bool>,

    /// Override dump verbosity.
    pub verbosity: Option<i64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "onefs", "onefs").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("onefs");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment.
///
/// Nested keys are addressed with a double underscore, e.g.
/// `ONEFS_PROFILES__LAB__ENDPOINT`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("ONEFS_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist or is invalid.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the username: profile first, then `ONEFS_USERNAME`.
pub fn resolve_username(profile: &Profile, profile_name: &str) -> Result<String, ConfigError> {
    profile
        .username
        .clone()
        .filter(|u| !u.is_empty())
        .or_else(|| std::env::var(USERNAME_ENV).ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })
}

/// Resolve the password: `ONEFS_PASSWORD`, then keyring, then plaintext.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    resolve_password_with(std::env::var(PASSWORD_ENV).ok(), profile, profile_name)
}

fn resolve_password_with(
    from_env: Option<String>,
    profile: &Profile,
    profile_name: &str,
) -> Result<SecretString, ConfigError> {
    // 1. Env var
    if let Some(pw) = from_env.filter(|pw| !pw.is_empty()) {
        return Ok(SecretString::from(pw));
    }

    // 2. Keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password")) {
        if let Ok(pw) = entry.get_password() {
            return Ok(SecretString::from(pw));
        }
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

// ── Translation ─────────────────────────────────────────────────────

/// Parse `"1.2"` / `"1.3"` (an optional `TLS` / `TLSv` prefix is accepted).
pub fn parse_tls_version(field: &str, raw: &str) -> Result<TlsVersion, ConfigError> {
    let trimmed = raw.trim();
    let bare = trimmed
        .strip_prefix("TLSv")
        .or_else(|| trimmed.strip_prefix("TLS"))
        .unwrap_or(trimmed)
        .trim();
    match bare {
        "1.2" => Ok(TlsVersion::Tls12),
        "1.3" => Ok(TlsVersion::Tls13),
        other => Err(ConfigError::invalid(
            field,
            format!("expected '1.2' or '1.3', got '{other}'"),
        )),
    }
}

/// Parse a humantime duration such as `"45s"` or `"2m"`.
pub fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(raw.trim())
        .map_err(|e| ConfigError::invalid("timeout", format!("'{raw}': {e}")))
}

/// Build the TLS policy for a profile, falling back to `defaults.insecure`.
pub fn tls_config(profile: &Profile, defaults: &Defaults) -> Result<TlsConfig, ConfigError> {
    let verification = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    let mut tls = TlsConfig {
        verification,
        ..TlsConfig::default()
    };
    if let Some(ref raw) = profile.min_tls_version {
        tls.min_version = parse_tls_version("min_tls_version", raw)?;
    }
    if let Some(ref raw) = profile.max_tls_version {
        tls.max_version = parse_tls_version("max_tls_version", raw)?;
    }
    if tls.min_version > tls.max_version {
        return Err(ConfigError::invalid(
            "min_tls_version",
            "minimum TLS version is newer than the maximum",
        ));
    }
    if let Some(ref suites) = profile.cipher_suites {
        if suites.iter().all(|s| s.trim().is_empty()) {
            return Err(ConfigError::invalid("cipher_suites", "must name at least one suite"));
        }
        tls.cipher_suites = Some(suites.iter().map(|s| s.trim().to_owned()).collect());
    }
    Ok(tls)
}

/// Build a `ClientConfig` from a profile, with no CLI flag overrides.
pub fn profile_to_client_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ClientConfig, ConfigError> {
    if profile.endpoint.trim().is_empty() {
        return Err(ConfigError::invalid("endpoint", "must not be empty"));
    }
    url::Url::parse(&profile.endpoint).map_err(|e| {
        ConfigError::invalid("endpoint", format!("invalid URL '{}': {e}", profile.endpoint))
    })?;

    let username = resolve_username(profile, profile_name)?;
    let password = resolve_password(profile, profile_name)?;
    let timeout = parse_timeout(profile.timeout.as_deref().unwrap_or(&defaults.timeout))?;

    let mut config = ClientConfig::new(profile.endpoint.clone(), username, password)
        .with_auth_mode(AuthMode::from_raw(profile.auth_mode.unwrap_or(defaults.auth_mode)))
        .with_tls(tls_config(profile, defaults)?)
        .with_timeout(timeout);

    if let Some(ref group) = profile.group {
        config.group.clone_from(group);
    }
    if let Some(ref path) = profile.volumes_path {
        config.volumes_path.clone_from(path);
    }
    if let Some(ref perms) = profile.volumes_path_permissions {
        config.volumes_path_permissions.clone_from(perms);
    }
    config.ignore_unresolvable_hosts = profile.ignore_unresolvable_hosts.unwrap_or(false);
    config.verbosity = Verbosity::from_raw(profile.verbosity.unwrap_or(defaults.verbosity));

    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    const SAMPLE: &str = r#"
default_profile = "lab"

[defaults]
timeout = "45s"

[profiles.lab]
endpoint = "https://lab-cluster:8080"
username = "admin"
password = "plain"
group = "storage"
auth_mode = 1
min_tls_version = "1.3"
cipher_suites = ["TLS13_AES_256_GCM_SHA384", "TLS13_CHACHA20_POLY1305_SHA256"]
volumes_path = "/ifs/data/csi"

[profiles.prod]
endpoint = "https://prod-cluster:8080"
username = "csi"
password = "secret"
insecure = true
timeout = "2m"
verbosity = 0
"#;

    fn write_sample(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        path
    }

    #[test]
    fn loads_profiles_and_default_selection() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&write_sample(&dir)).unwrap();

        assert_eq!(config.default_profile.as_deref(), Some("lab"));
        assert_eq!(config.defaults.timeout, "45s");
        let (name, profile) = config.profile(None).unwrap();
        assert_eq!(name, "lab");
        assert_eq!(profile.endpoint, "https://lab-cluster:8080");

        let (name, _) = config.profile(Some("prod")).unwrap();
        assert_eq!(name, "prod");
        assert!(matches!(
            config.profile(Some("missing")),
            Err(ConfigError::ProfileNotFound { .. })
        ));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.default_profile.as_deref(), Some("default"));
        assert_eq!(config.defaults.timeout, "30s");
        assert_eq!(config.defaults.verbosity, 2);
    }

    #[test]
    fn profile_translates_to_client_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&write_sample(&dir)).unwrap();
        let (name, profile) = config.profile(Some("lab")).unwrap();

        let client = profile_to_client_config(profile, &name, &config.defaults).unwrap();

        assert_eq!(client.endpoint, "https://lab-cluster:8080");
        assert_eq!(client.group, "storage");
        assert_eq!(client.auth_mode, AuthMode::SessionBased);
        assert_eq!(client.tls.min_version, TlsVersion::Tls13);
        assert_eq!(client.tls.verification, TlsVerification::SystemDefaults);
        assert_eq!(
            client.tls.cipher_suites.as_deref(),
            Some(&["TLS13_AES_256_GCM_SHA384".to_owned(), "TLS13_CHACHA20_POLY1305_SHA256".to_owned()][..])
        );
        assert_eq!(client.timeout, Duration::from_secs(45));
        assert_eq!(client.volumes_path, "/ifs/data/csi");
        assert_eq!(client.volumes_path_permissions, "0777");
        assert_eq!(client.verbosity, Verbosity::Low);
    }

    #[test]
    fn profile_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&write_sample(&dir)).unwrap();
        let (name, profile) = config.profile(Some("prod")).unwrap();

        let client = profile_to_client_config(profile, &name, &config.defaults).unwrap();

        assert_eq!(client.auth_mode, AuthMode::Basic);
        assert_eq!(client.tls.verification, TlsVerification::DangerAcceptInvalid);
        assert_eq!(client.timeout, Duration::from_secs(120));
        assert_eq!(client.verbosity, Verbosity::High);
    }

    #[test]
    fn env_password_wins_over_plaintext() {
        let profile = Profile {
            password: Some("plain".into()),
            ..Profile::default()
        };
        let pw = resolve_password_with(Some("from-env".into()), &profile, "onefs-config-test-env").unwrap();
        assert_eq!(pw.expose_secret(), "from-env");

        let pw = resolve_password_with(None, &profile, "onefs-config-test-plain").unwrap();
        assert_eq!(pw.expose_secret(), "plain");
    }

    #[test]
    fn missing_password_is_an_error() {
        let err = resolve_password_with(None, &Profile::default(), "onefs-config-test-none").unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { profile } if profile == "onefs-config-test-none"));
    }

    #[test]
    fn tls_versions_are_validated() {
        assert_eq!(parse_tls_version("min_tls_version", "1.2").unwrap(), TlsVersion::Tls12);
        assert_eq!(parse_tls_version("min_tls_version", "TLSv1.3").unwrap(), TlsVersion::Tls13);

        let err = parse_tls_version("max_tls_version", "1.1").unwrap_err();
        assert_eq!(err.to_string(), "invalid max_tls_version: expected '1.2' or '1.3', got '1.1'");

        let profile = Profile {
            min_tls_version: Some("1.3".into()),
            max_tls_version: Some("1.2".into()),
            ..Profile::default()
        };
        assert!(tls_config(&profile, &Defaults::default()).is_err());
    }

    #[test]
    fn cipher_suites_pass_through_to_tls_policy() {
        let profile = Profile {
            cipher_suites: Some(vec![" TLS13_AES_128_GCM_SHA256 ".into()]),
            ..Profile::default()
        };
        let tls = tls_config(&profile, &Defaults::default()).unwrap();
        assert_eq!(tls.cipher_suites, Some(vec!["TLS13_AES_128_GCM_SHA256".to_owned()]));

        assert_eq!(tls_config(&Profile::default(), &Defaults::default()).unwrap().cipher_suites, None);

        let empty = Profile {
            cipher_suites: Some(vec![]),
            ..Profile::default()
        };
        let err = tls_config(&empty, &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "cipher_suites"));
    }

    #[test]
    fn bad_endpoint_and_timeout_are_rejected() {
        let profile = Profile {
            endpoint: "not a url".into(),
            username: Some("admin".into()),
            password: Some("pw".into()),
            ..Profile::default()
        };
        let err = profile_to_client_config(&profile, "onefs-config-test-url", &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "endpoint"));

        assert!(matches!(parse_timeout("soon"), Err(ConfigError::Validation { .. })));
        assert_eq!(parse_timeout("1m 30s").unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.profiles.insert(
            "default".into(),
            Profile {
                endpoint: "https://c:8080".into(),
                username: Some("admin".into()),
                ..Profile::default()
            },
        );

        save_config_to(&config, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();

        let (_, profile) = loaded.profile(None).unwrap();
        assert_eq!(profile.endpoint, "https://c:8080");
        assert_eq!(profile.username.as_deref(), Some("admin"));
    }
}
