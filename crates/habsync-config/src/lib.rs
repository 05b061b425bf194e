//! Profile configuration for habsync.
//!
//! TOML profiles merged with `HABSYNC_*` environment variables, API token
//! resolution (env var, system keyring, plaintext) and translation into
//! `habsync_core::ConnectionConfig`.

use std::collections::BTreeMap;
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

use habsync_core::{ConnectionConfig, TlsVerification};

/// Keyring service name under which tokens are stored.
pub const KEYRING_SERVICE: &str = "habsync";

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "HABSYNC_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String, available: Vec<String> },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

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

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named server profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile by name.
    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound {
                name: name.into(),
                available: self.profiles.keys().cloned().collect(),
            })
    }

    /// The profile name to use when none is requested explicitly.
    pub fn default_profile_name(&self) -> &str {
        self.default_profile.as_deref().unwrap_or("default")
    }
}

/// Values applied when a profile leaves a setting unset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Watched-item refresh period in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Open the WebSocket event stream.
    #[serde(default = "default_push")]
    pub push: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
            push: default_push(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    10
}
fn default_poll_interval() -> u64 {
    5
}
fn default_push() -> bool {
    true
}

/// A named openHAB server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Server base URL, e.g. `http://openhab.local:8080`.
    pub server: String,

    /// API token (plaintext; prefer the keyring or `token_env`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Name of an environment variable holding the API token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,

    /// Path to a custom CA certificate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub push: Option<bool>,
}

impl Profile {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ..Self::default()
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `$HABSYNC_CONFIG`, else the platform
/// config directory.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }

    ProjectDirs::from("org", "habsync", "habsync").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("habsync");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Loading / saving ────────────────────────────────────────────────

/// Load the config from the canonical path plus environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the config from `path`, merged over defaults and under
/// `HABSYNC_` variables (`__` separates nested keys, e.g.
/// `HABSYNC_DEFAULTS__OUTPUT=json`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");

    let config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("HABSYNC_").split("__"))
        .extract()?;
    Ok(config)
}

/// Load config, falling back to defaults on any error.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

/// Write `cfg` to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(&path, cfg)?;
    Ok(path)
}

/// Serialize `cfg` as TOML and write it to `path`, creating parent dirs.
pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(cfg)?)?;
    Ok(())
}

// ── Token resolution ────────────────────────────────────────────────

fn keyring_user(profile_name: &str) -> String {
    format!("{profile_name}/token")
}

/// Resolve a profile's API token: `token_env` variable, then the system
/// keyring, then the plaintext `token`. `None` means unauthenticated.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    resolve_token_with(profile, profile_name, |user| {
        keyring::Entry::new(KEYRING_SERVICE, user)
            .and_then(|entry| entry.get_password())
            .ok()
    })
}

/// [`resolve_token`] with a caller-supplied keyring lookup.
pub fn resolve_token_with(
    profile: &Profile,
    profile_name: &str,
    keyring_lookup: impl FnOnce(&str) -> Option<String>,
) -> Option<SecretString> {
    if let Some(ref env_name) = profile.token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
        debug!(variable = %env_name, "token variable not set");
    }

    if let Some(secret) = keyring_lookup(&keyring_user(profile_name)) {
        return Some(SecretString::from(secret));
    }

    profile.token.clone().map(SecretString::from)
}

/// Store `token` for `profile_name` in the system keyring.
pub fn store_token(profile_name: &str, token: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name))?.set_password(token)?;
    Ok(())
}

// ── Profile → ConnectionConfig ──────────────────────────────────────

fn nonzero_secs(field: &str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: "must be at least 1 second".into(),
        });
    }
    Ok(Duration::from_secs(secs))
}

/// Build a `ConnectionConfig` from a profile, filling gaps from `defaults`.
///
/// Zero-second timeouts or refresh periods are rejected.
pub fn profile_to_connection_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ConnectionConfig, ConfigError> {
    let mut config =
        ConnectionConfig::from_url(&profile.server).map_err(|e| ConfigError::Validation {
            field: "server".into(),
            reason: e.to_string(),
        })?;

    config.timeout = nonzero_secs("timeout", profile.timeout.unwrap_or(defaults.timeout))?;
    config.poll_interval = nonzero_secs(
        "poll_interval",
        profile.poll_interval.unwrap_or(defaults.poll_interval),
    )?;
    config.token = resolve_token(profile, profile_name);
    config.tls = if profile.insecure.unwrap_or(false) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };
    config.push_enabled = profile.push.unwrap_or(defaults.push);

    Ok(config)
}
