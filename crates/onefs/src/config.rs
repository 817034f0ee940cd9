//! Flag-aware profile resolution.
//!
//! The config crate knows profiles; this layer folds the global flags into
//! the selected profile before it is translated to a `ClientConfig`.

use onefs_api::{ClientConfig, Verbosity};
use onefs_config::{Config, Profile, config_path, load_config_or_default, profile_to_client_config};
use secrecy::SecretString;

use crate::cli::{AuthModeArg, GlobalOpts};
use crate::error::CliError;

/// Build a `ClientConfig` from the config file, profile, and CLI overrides.
pub fn build_client_config(global: &GlobalOpts) -> Result<ClientConfig, CliError> {
    let cfg = load_config_or_default();
    resolve(&cfg, global)
}

fn resolve(cfg: &Config, global: &GlobalOpts) -> Result<ClientConfig, CliError> {
    let (name, mut profile) = match cfg.profile(global.profile.as_deref()) {
        Ok((name, profile)) => (name, profile.clone()),
        // No profile: flags and env alone must name the cluster, unless a
        // profile was asked for by name.
        Err(err) if global.profile.is_some() => return Err(err.into()),
        Err(_) => {
            if global.endpoint.is_none() {
                return Err(CliError::NoConfig {
                    path: config_path().display().to_string(),
                });
            }
            ("cli".to_owned(), Profile::default())
        }
    };

    apply_overrides(&mut profile, global);
    let mut config = profile_to_client_config(&profile, &name, &cfg.defaults)?;
    // A password flag beats the keyring, which the profile chain consults first.
    if let Some(ref password) = global.password {
        config.password = SecretString::from(password.clone());
    }
    if global.verbose >= 3 {
        config.verbosity = Verbosity::High;
    }

    tracing::debug!(profile = %name, endpoint = %config.endpoint, "resolved client config");
    Ok(config)
}

/// Fold flag values into the profile; flags win over profile values.
fn apply_overrides(profile: &mut Profile, global: &GlobalOpts) {
    if let Some(ref endpoint) = global.endpoint {
        profile.endpoint.clone_from(endpoint);
    }
    if let Some(ref username) = global.username {
        profile.username = Some(username.clone());
    }
    if let Some(ref password) = global.password {
        profile.password = Some(password.clone());
    }
    if let Some(mode) = global.auth_mode {
        profile.auth_mode = Some(match mode {
            AuthModeArg::Basic => 0,
            AuthModeArg::Session => 1,
        });
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(ref timeout) = global.timeout {
        profile.timeout = Some(timeout.clone());
    }
}
