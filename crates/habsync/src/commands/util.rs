//! Shared helpers for command handlers.

use habsync_core::{Item, SyncEngine};

use crate::error::CliError;

/// Resolve an item by link or by name.
pub fn resolve_item(engine: &SyncEngine, identifier: &str) -> Result<Item, CliError> {
    engine
        .find(identifier)
        .or_else(|| engine.registry().find_by_id(identifier))
        .ok_or_else(|| CliError::NotFound {
            identifier: identifier.into(),
        })
}

/// `-` for empty optional text in tables.
pub fn or_dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_owned()
}
