// ── Item domain type ──

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::command::numeric::extract_numeric;
use crate::convert::format_pattern;

/// Coarse item type, used to pick toggle and adjust behaviour.
///
/// Dimensioned types (`Number:Temperature`, ...) are [`Number`](Self::Number);
/// the full type string stays on [`Item::item_type`]. Unknown types pass
/// through as [`Other`](Self::Other).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Switch,
    Dimmer,
    Number,
    String,
    Other(std::string::String),
}

impl ItemKind {
    /// Classify a raw openHAB type string.
    pub fn from_type(raw: &str) -> Self {
        let base = raw.split_once(':').map_or(raw, |(base, _)| base);
        match base {
            "Switch" => Self::Switch,
            "Dimmer" => Self::Dimmer,
            "Number" => Self::Number,
            "String" => Self::String,
            _ => Self::Other(raw.to_owned()),
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Switch => f.write_str("Switch"),
            Self::Dimmer => f.write_str("Dimmer"),
            Self::Number => f.write_str("Number"),
            Self::String => f.write_str("String"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

/// One controllable or observable endpoint on the server.
///
/// `id` and `link` never change after the registry is loaded; `state` and
/// `watched` are the only mutable fields and are only written through the
/// registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Stable item name, unique per server.
    pub id: String,
    /// Direct-access URL; the key the UI layer uses.
    pub link: String,
    pub label: String,
    pub kind: ItemKind,
    /// Full type string as reported, e.g. `"Number:DataTransferRate"`.
    pub item_type: String,
    /// First group reported by the server; `None` means ungrouped.
    pub group: Option<String>,
    /// Icon category.
    pub category: Option<String>,
    /// Display pattern from the state description, e.g. `"%.1f %unit%"`.
    pub pattern: Option<String>,
    /// Last known raw state.
    pub state: Option<String>,
    pub watched: bool,
}

impl Item {
    pub fn is_ungrouped(&self) -> bool {
        self.group.is_none()
    }

    /// Leading number of the cached state, if any.
    pub fn numeric_state(&self) -> Option<f64> {
        self.state.as_deref().and_then(extract_numeric)
    }

    /// Cached state rendered through the item's display pattern.
    ///
    /// Falls back to the raw state when there is no pattern, and to an
    /// empty string when the state is unknown.
    pub fn display_state(&self) -> String {
        let state = self.state.as_deref().unwrap_or_default();
        match self.pattern.as_deref() {
            Some(pattern) => format_pattern(pattern, state),
            None => state.to_owned(),
        }
    }
}
