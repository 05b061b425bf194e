//! CLI configuration: a thin layer over `habsync_config` that applies
//! `GlobalOpts` overrides (--server, --token, --insecure, --timeout).

use std::time::Duration;

use secrecy::SecretString;

use habsync_core::{ConnectionConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use habsync_config::{
    Config, Profile, config_path, load_config_or_default, save_config,
};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .unwrap_or_else(|| config.default_profile_name().to_owned())
}

/// Build the engine configuration from the config file, the active
/// profile, and CLI overrides (flags win).
///
/// Without a matching profile, `--server` alone is enough.
pub fn resolve_connection(global: &GlobalOpts) -> Result<(String, ConnectionConfig), CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let mut conn = match cfg.profiles.get(&profile_name) {
        Some(profile) => {
            habsync_config::profile_to_connection_config(profile, &profile_name, &cfg.defaults)?
        }
        None => {
            // An explicit --profile must exist.
            if global.profile.is_some() && global.server.is_none() {
                cfg.profile(&profile_name)?;
            }
            let server = global
                .server
                .as_deref()
                .ok_or_else(|| CliError::NoConfig {
                    path: config_path().display().to_string(),
                })?;
            let mut conn = ConnectionConfig::from_url(server)?;
            conn.timeout = Duration::from_secs(cfg.defaults.timeout);
            conn.poll_interval = Duration::from_secs(cfg.defaults.poll_interval);
            conn.push_enabled = cfg.defaults.push;
            conn
        }
    };

    if let Some(ref server) = global.server {
        let url = ConnectionConfig::from_url(server)?.url;
        conn = conn.with_url(url);
    }
    if let Some(ref token) = global.token {
        conn.token = Some(SecretString::from(token.clone()));
    }
    if global.insecure {
        conn.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        conn.timeout = Duration::from_secs(secs);
    }
    conn.validate()?;

    Ok((profile_name, conn))
}
