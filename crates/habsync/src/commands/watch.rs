//! Stream item state changes until Ctrl-C or `--count` changes.

use chrono::Local;

use habsync_core::{ChangeEvent, SyncEngine};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::util;

fn render_event(event: &ChangeEvent, format: OutputFormat, color: bool) -> Result<String, CliError> {
    Ok(match format {
        // One JSON document per line, pretty or not.
        OutputFormat::Json | OutputFormat::JsonCompact => serde_json::to_string(event)?,
        OutputFormat::Plain => format!("{} {}", event.item, event.new_state),
        OutputFormat::Table => format!(
            "{}  {:<24} {} -> {}  ({})",
            event.observed_at.with_timezone(&Local).format("%H:%M:%S"),
            event.item,
            output::paint_state(event.previous_state.as_deref().unwrap_or("-"), color),
            output::paint_state(&event.new_state, color),
            event.source,
        ),
    })
}

pub async fn handle(
    engine: &SyncEngine,
    args: &WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let links = args
        .items
        .iter()
        .map(|identifier| util::resolve_item(engine, identifier).map(|item| item.link))
        .collect::<Result<Vec<_>, _>>()?;

    let color = output::should_color(global.color);
    let mut subscription = engine.subscribe();
    for link in &links {
        engine.set_watched(link);
    }
    if !global.quiet && global.output == OutputFormat::Table {
        eprintln!("Watching {} item(s), Ctrl-C to stop", links.len());
    }

    let mut seen = 0usize;
    let result = loop {
        if args.count.is_some_and(|limit| seen >= limit) {
            break Ok(());
        }

        tokio::select! {
            biased;
            signal = tokio::signal::ctrl_c() => break signal.map_err(CliError::from),
            event = subscription.recv() => {
                let Some(event) = event else { break Ok(()) };
                if !links.contains(&event.link) {
                    continue;
                }
                seen += 1;
                output::print_output(&render_event(&event, global.output, color)?, global.quiet);
            }
        }
    };

    subscription.cancel();
    for link in &links {
        engine.unwatch(link);
    }
    result
}
