mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use habsync_core::SyncEngine;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a server connection
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "habsync", &mut std::io::stdout());
            Ok(())
        }

        // Everything else loads the catalog first
        cmd => {
            let (profile, mut conn) = config::resolve_connection(&cli.global)?;
            commands::tune_connection(&cmd, &mut conn);

            let engine = SyncEngine::new();
            let count = engine
                .initialize(conn)
                .await
                .map_err(|e| CliError::from(e).for_profile(&profile))?;
            tracing::debug!(command = ?cmd, items = count, "dispatching command");

            let result = commands::dispatch(cmd, &engine, &cli.global)
                .await
                .map_err(|e| e.for_profile(&profile));
            engine.shutdown().await;
            result
        }
    }
}
