//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and distinct exit codes.

use miette::Diagnostic;
use thiserror::Error;

use habsync_config::ConfigError;
use habsync_core::CoreError;

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

    #[error("Could not reach openHAB at {url}")]
    #[diagnostic(
        code(habsync::unreachable),
        help(
            "Check that the server is running and accessible.\n\
             Reason: {reason}"
        )
    )]
    Unreachable { url: String, reason: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(habsync::timeout),
        help("Increase the timeout with --timeout or check server responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── Authentication ───────────────────────────────────────────────

    #[error("openHAB rejected the API token")]
    #[diagnostic(
        code(habsync::auth_failed),
        help(
            "Create a token under your openHAB user profile, then run:\n\
             habsync config set-token <TOKEN> --profile {profile}"
        )
    )]
    AuthFailed { profile: String },

    // ── Items ────────────────────────────────────────────────────────

    #[error("Item '{identifier}' not found")]
    #[diagnostic(
        code(habsync::not_found),
        help("Run: habsync items to see available items")
    )]
    NotFound { identifier: String },

    #[error("Item '{item}' has no numeric state (current: '{value}')")]
    #[diagnostic(
        code(habsync::not_numeric),
        help("Use `habsync set` to send an absolute value instead.")
    )]
    NotNumeric { item: String, value: String },

    // ── Server ───────────────────────────────────────────────────────

    #[error("Unexpected response from openHAB: {message}")]
    #[diagnostic(code(habsync::protocol))]
    Protocol { message: String },

    #[error("{message}")]
    #[diagnostic(code(habsync::internal))]
    Internal { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(habsync::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(habsync::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: habsync config init --server <URL>"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No server configured")]
    #[diagnostic(
        code(habsync::no_config),
        help(
            "Pass --server <URL>, or create a profile with: habsync config init --server <URL>\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(habsync::config))]
    Config(Box<ConfigError>),

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    #[diagnostic(code(habsync::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unreachable { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::NotNumeric { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Name the profile in authentication errors.
    pub fn for_profile(self, name: &str) -> Self {
        match self {
            Self::AuthFailed { .. } => Self::AuthFailed {
                profile: name.into(),
            },
            other => other,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::ProfileNotFound { name, available } => CliError::ProfileNotFound {
                name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(Box::new(other)),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        if err.is_unauthorized() {
            return CliError::AuthFailed {
                profile: "current".into(),
            };
        }

        match err {
            CoreError::Unreachable { url, reason } => CliError::Unreachable { url, reason },
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::Protocol { message, .. } => CliError::Protocol { message },
            CoreError::NotFound { identifier } => CliError::NotFound { identifier },
            CoreError::ValueUnparseable { link, value } => CliError::NotNumeric {
                item: link,
                value,
            },
            CoreError::Config { message } => CliError::Validation {
                field: "connection".into(),
                reason: message,
            },
            CoreError::NotInitialized => CliError::Internal {
                message: "the item catalog is not loaded".into(),
            },
            CoreError::Internal(message) => CliError::Internal { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_protocol_error_maps_to_auth() {
        let err = CliError::from(CoreError::Protocol {
            message: "HTTP 401".into(),
            status: Some(401),
        });
        assert!(matches!(err, CliError::AuthFailed { .. }));
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }

    #[test]
    fn exit_codes_follow_error_class() {
        let unreachable = CliError::from(CoreError::Unreachable {
            url: "http://oh".into(),
            reason: "refused".into(),
        });
        assert_eq!(unreachable.exit_code(), exit_code::CONNECTION);

        let missing = CliError::from(CoreError::NotFound {
            identifier: "Kitchen".into(),
        });
        assert_eq!(missing.exit_code(), exit_code::NOT_FOUND);

        let profile = CliError::from(ConfigError::ProfileNotFound {
            name: "lab".into(),
            available: vec![],
        });
        assert!(matches!(profile, CliError::ProfileNotFound { ref available, .. } if available == "(none)"));
        assert_eq!(profile.exit_code(), exit_code::GENERAL);
    }
}
