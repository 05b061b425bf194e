// ── Command API ──
//
// Outbound network operations flow through a `Command` enum and a single
// processor task, so writes reach the server in submission order. Value
// computation (toggle, adjust) happens before submission, against the
// optimistically updated cache.

pub mod numeric;

use crate::error::CoreError;
use crate::model::{Item, ItemKind};

pub use numeric::{OnOff, clamp, extract_numeric, format_number, split_numeric};

/// A command envelope sent through the command channel.
/// Contains the command and a oneshot response channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// Network operations executed by the command processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Write `value` and read back the confirmed state.
    SetState { link: String, value: String },
    /// Re-read one item's state immediately.
    ReadState { link: String },
}

impl Command {
    pub fn link(&self) -> &str {
        match self {
            Self::SetState { link, .. } | Self::ReadState { link } => link,
        }
    }
}

/// Outcome of a processed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub link: String,
    /// State the server reported after the operation.
    pub state: String,
}

/// Default toggle semantics.
///
/// Dimmers go `OFF` when lit and `ON` otherwise; anything whose state is
/// `ON`/`OFF` flips. Other states cannot be toggled without a caller
/// supplied function.
pub fn toggled_value(item: &Item) -> Result<String, CoreError> {
    let state = item.state.as_deref().unwrap_or_default();

    if item.kind == ItemKind::Dimmer {
        let lit = item.numeric_state().is_some_and(|level| level > 0.0)
            || matches!(state.parse::<OnOff>(), Ok(OnOff::On));
        let next = if lit { OnOff::Off } else { OnOff::On };
        return Ok(next.to_string());
    }

    match state.parse::<OnOff>() {
        Ok(current) => Ok(current.toggled().to_string()),
        // Switches with no usable state yet start from OFF.
        Err(_) if item.kind == ItemKind::Switch => Ok(OnOff::On.to_string()),
        Err(_) => Err(CoreError::ValueUnparseable {
            link: item.link.clone(),
            value: state.to_owned(),
        }),
    }
}

/// Cached numeric state plus `delta`, clamped to `[min, max]`.
pub fn adjusted_value(item: &Item, delta: f64, min: f64, max: f64) -> Result<String, CoreError> {
    let current = item
        .numeric_state()
        .ok_or_else(|| CoreError::ValueUnparseable {
            link: item.link.clone(),
            value: item.state.clone().unwrap_or_default(),
        })?;
    Ok(format_number(clamp(current + delta, min, max)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(kind: ItemKind, state: &str) -> Item {
        Item {
            id: "Test".into(),
            link: "http://oh/rest/items/Test".into(),
            label: "Test".into(),
            item_type: kind.to_string(),
            kind,
            group: None,
            category: None,
            pattern: None,
            state: Some(state.into()),
            watched: false,
        }
    }

    #[test]
    fn switch_toggles() {
        assert_eq!(toggled_value(&item(ItemKind::Switch, "ON")).unwrap(), "OFF");
        assert_eq!(toggled_value(&item(ItemKind::Switch, "OFF")).unwrap(), "ON");
        assert_eq!(toggled_value(&item(ItemKind::Switch, "NULL")).unwrap(), "ON");
    }

    #[test]
    fn dimmer_toggle_depends_on_level() {
        assert_eq!(toggled_value(&item(ItemKind::Dimmer, "40")).unwrap(), "OFF");
        assert_eq!(toggled_value(&item(ItemKind::Dimmer, "0")).unwrap(), "ON");
        assert_eq!(toggled_value(&item(ItemKind::Dimmer, "NULL")).unwrap(), "ON");
    }

    #[test]
    fn number_cannot_toggle() {
        let err = toggled_value(&item(ItemKind::Number, "21.5 °C")).unwrap_err();
        assert!(matches!(err, CoreError::ValueUnparseable { .. }));
    }

    #[test]
    fn adjust_clamps() {
        let dimmer = item(ItemKind::Dimmer, "95");
        assert_eq!(adjusted_value(&dimmer, 10.0, 0.0, 100.0).unwrap(), "100");
        assert_eq!(adjusted_value(&dimmer, -5.0, 0.0, 100.0).unwrap(), "90");

        let low = item(ItemKind::Dimmer, "3");
        assert_eq!(adjusted_value(&low, -10.0, 0.0, 100.0).unwrap(), "0");
    }

    #[test]
    fn adjust_requires_numeric_state() {
        let switch = item(ItemKind::Switch, "ON");
        assert!(matches!(
            adjusted_value(&switch, 1.0, 0.0, 100.0),
            Err(CoreError::ValueUnparseable { .. })
        ));
    }

    #[test]
    fn command_link() {
        let cmd = Command::ReadState {
            link: "http://oh/rest/items/A".into(),
        };
        assert_eq!(cmd.link(), "http://oh/rest/items/A");
    }
}
