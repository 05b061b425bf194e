// ── Change notification types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which update path observed a state transition.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChangeSource {
    /// Refresh cycle read.
    Poll,
    /// WebSocket event.
    Push,
    /// Optimistic update from a local command.
    Command,
    /// State the server reported after a write.
    Confirmation,
}

/// Emitted whenever an item's cached state changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub link: String,
    /// Item name.
    pub item: String,
    pub new_state: String,
    pub previous_state: Option<String>,
    pub source: ChangeSource,
    pub observed_at: DateTime<Utc>,
}
