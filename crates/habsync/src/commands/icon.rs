//! Icon download.

use std::path::PathBuf;

use habsync_core::SyncEngine;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(
    engine: &SyncEngine,
    identifier: &str,
    file: Option<PathBuf>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let item = util::resolve_item(engine, identifier)?;
    if item.category.is_none() {
        return Err(CliError::Validation {
            field: "item".into(),
            reason: format!("'{}' has no icon category", item.id),
        });
    }

    let bytes = engine.icon(&item.link).await?;
    let path = file.unwrap_or_else(|| PathBuf::from(format!("{}.svg", item.id)));
    tokio::fs::write(&path, &bytes).await?;

    tracing::debug!(path = %path.display(), bytes = bytes.len(), "icon written");
    output::print_output(&path.display().to_string(), global.quiet);
    Ok(())
}
