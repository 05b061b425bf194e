// ── Core error types ──
//
// Domain errors from habsync-core. Consumers never match on HTTP status
// codes or JSON failures directly: the `From<habsync_api::Error>` impl
// folds transport-layer errors into this taxonomy.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach openHAB at {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Protocol errors ──────────────────────────────────────────────
    #[error("Unexpected response from openHAB: {message}")]
    Protocol {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Item not found: {identifier}")]
    NotFound { identifier: String },

    #[error("State of {link} is not numeric: '{value}'")]
    ValueUnparseable { link: String, value: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Engine not initialized -- the item catalog has not been loaded")]
    NotInitialized,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether the server could not be reached (retry later).
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. } | Self::Timeout { .. })
    }

    /// Whether the server rejected the configured token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::Protocol {
                status: Some(401 | 403),
                ..
            }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<habsync_api::Error> for CoreError {
    fn from(err: habsync_api::Error) -> Self {
        match err {
            habsync_api::Error::Transport(ref e) => {
                let url = e.url().map(ToString::to_string).unwrap_or_default();
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() || e.is_request() {
                    CoreError::Unreachable {
                        url,
                        reason: e.to_string(),
                    }
                } else if e.status().map(|s| s.as_u16()) == Some(404) {
                    CoreError::NotFound { identifier: url }
                } else {
                    CoreError::Protocol {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            habsync_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            habsync_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            habsync_api::Error::Tls(msg) => CoreError::Unreachable {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            habsync_api::Error::Status { status: 404, url } => CoreError::NotFound {
                identifier: url.trim_end_matches("/state").to_owned(),
            },
            habsync_api::Error::Status { status, url } => CoreError::Protocol {
                message: format!("HTTP {status} from {url}"),
                status: Some(status),
            },
            habsync_api::Error::Unauthorized { status } => CoreError::Protocol {
                message: "the server rejected the API token".into(),
                status: Some(status),
            },
            habsync_api::Error::WebSocketConnect(reason)
            | habsync_api::Error::WebSocketSend(reason) => CoreError::Unreachable {
                url: String::new(),
                reason: format!("WebSocket: {reason}"),
            },
            habsync_api::Error::WebSocketClosed { code, reason } => CoreError::Unreachable {
                url: String::new(),
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            habsync_api::Error::Deserialization { message, body: _ } => CoreError::Protocol {
                message: format!("malformed body: {message}"),
                status: None,
            },
        }
    }
}
