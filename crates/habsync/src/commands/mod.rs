//! Command dispatch: bridges CLI args to engine operations and output.

pub mod config_cmd;
pub mod icon;
pub mod items;
pub mod state;
pub mod util;
pub mod watch;

use std::time::Duration;

use habsync_core::{ConnectionConfig, SyncEngine};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Adjust the engine configuration for a one-shot or streaming command.
///
/// Only `watch` keeps the push stream open; everything else needs the
/// catalog and the command path.
pub fn tune_connection(cmd: &Command, conn: &mut ConnectionConfig) {
    match cmd {
        Command::Watch(args) => {
            if args.no_push {
                conn.push_enabled = false;
            }
            if let Some(secs) = args.interval {
                conn.poll_interval = Duration::from_secs(secs.max(1));
            }
        }
        _ => conn.push_enabled = false,
    }
}

/// Dispatch a server-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    engine: &SyncEngine,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Items(args) => items::handle(engine, &args, global),
        Command::Get { item, refresh } => state::get(engine, &item, refresh, global).await,
        Command::Set { item, value } => state::set(engine, &item, &value, global).await,
        Command::Toggle { item } => state::toggle(engine, &item, global).await,
        Command::Dim(args) => state::dim(engine, &args, global).await,
        Command::Watch(args) => watch::handle(engine, &args, global).await,
        Command::Icon { item, file } => icon::handle(engine, &item, file, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal {
            message: "command does not need a server connection".into(),
        }),
    }
}
