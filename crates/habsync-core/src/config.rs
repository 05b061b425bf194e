// ── Runtime connection configuration ──
//
// Describes *how* to reach one openHAB server and how often to refresh.
// Carries the API token but never touches disk: the CLI builds a
// `ConnectionConfig` from its profile and hands it to `SyncEngine::initialize`.

use std::path::PathBuf;
use std::time::Duration;

use habsync_api::ReconnectConfig;
use habsync_api::transport::{TlsMode, TransportConfig};
use secrecy::SecretString;
use url::Url;

use crate::error::CoreError;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict). Default: most openHAB installs are plain
    /// HTTP on the LAN, and HTTPS ones usually sit behind a real proxy.
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed certs).
    DangerAcceptInvalid,
}

/// Configuration for one engine instance.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server base URL, e.g. `http://openhab.local:8080`.
    pub url: Url,
    /// Optional API token, sent as a bearer token.
    pub token: Option<SecretString>,
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Period of the watched-item refresh cycle.
    pub poll_interval: Duration,
    /// Open the WebSocket event stream alongside polling.
    pub push_enabled: bool,
    /// Interval between WebSocket heartbeat frames.
    pub heartbeat_interval: Duration,
    /// Backoff policy for WebSocket reconnection.
    pub reconnect: ReconnectConfig,
}

impl ConnectionConfig {
    /// Defaults for everything but the server URL.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            token: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(5),
            push_enabled: true,
            heartbeat_interval: Duration::from_secs(5),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Parse `url` and apply defaults.
    pub fn from_url(url: &str) -> Result<Self, CoreError> {
        let url = Url::parse(url).map_err(|e| CoreError::Config {
            message: format!("invalid server URL '{url}': {e}"),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CoreError::Config {
                message: format!("server URL must be http or https, got '{}'", url.scheme()),
            });
        }
        Ok(Self::new(url))
    }

    /// Reject settings the background tasks cannot run with.
    ///
    /// Every interval drives a `tokio::time::interval`, which requires a
    /// non-zero period.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (field, value) in [
            ("timeout", self.timeout),
            ("poll_interval", self.poll_interval),
            ("heartbeat_interval", self.heartbeat_interval),
        ] {
            if value.is_zero() {
                return Err(CoreError::Config {
                    message: format!("{field} must be greater than zero"),
                });
            }
        }
        Ok(())
    }

    /// The same configuration pointed at another server.
    pub fn with_url(mut self, url: Url) -> Self {
        self.url = url;
        self
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: match &self.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
                TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
            },
            timeout: self.timeout,
            token: self.token.clone(),
        }
    }
}
