use thiserror::Error;

/// Top-level error type for the `habsync-api` crate.
///
/// Covers every failure mode across both API surfaces: the REST endpoints
/// and the WebSocket event stream. `habsync-core` maps these into its
/// domain taxonomy (unreachable, protocol, not found).
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── REST API ────────────────────────────────────────────────────
    /// The server answered with a non-success status code.
    #[error("Unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    /// The server rejected the configured API token.
    #[error("Unauthorized (HTTP {status}) -- check the API token")]
    Unauthorized { status: u16 },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// Sending a frame (heartbeat or close) failed.
    #[error("WebSocket send failed: {0}")]
    WebSocketSend(String),

    /// WebSocket closed unexpectedly.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the server could not be reached at all, as opposed
    /// to answering with something unexpected.
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Self::Timeout { .. } | Self::WebSocketConnect(_) => true,
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status >= 500,
            other => other.is_unreachable(),
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Status { status: 404, .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        let err = Error::Status {
            status: 503,
            url: "http://oh/rest/items".into(),
        };
        assert!(err.is_transient());
        assert!(!err.is_unreachable());
    }

    #[test]
    fn client_errors_are_not_transient() {
        let err = Error::Status {
            status: 400,
            url: "http://oh/rest/items/Light".into(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn status_404_is_not_found() {
        let err = Error::Status {
            status: 404,
            url: "http://oh/rest/items/Nope".into(),
        };
        assert!(err.is_not_found());
    }

    #[test]
    fn websocket_connect_is_unreachable() {
        assert!(Error::WebSocketConnect("refused".into()).is_unreachable());
    }
}
