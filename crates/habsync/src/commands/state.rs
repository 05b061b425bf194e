//! Item state handlers: get, set, toggle, dim.

use serde::Serialize;

use habsync_core::SyncEngine;

use crate::cli::{DimArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::items::ItemView;
use super::util::{self, or_dash};

/// Result of a state-changing command.
#[derive(Debug, Serialize)]
struct StateChange {
    item: String,
    previous: Option<String>,
    state: String,
}

fn detail(item: &ItemView, color: bool) -> String {
    [
        format!("Name:      {}", item.name),
        format!("Label:     {}", item.label),
        format!("Type:      {}", item.item_type),
        format!("Group:     {}", or_dash(item.group.as_deref())),
        format!("Category:  {}", or_dash(item.category.as_deref())),
        format!(
            "State:     {}",
            output::paint_state(item.state.as_deref().unwrap_or("-"), color)
        ),
        format!("Display:   {}", item.display),
        format!("Link:      {}", item.link),
    ]
    .join("\n")
}

fn print_change(change: &StateChange, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(global.color);
    let out = output::render_single(
        global.output,
        change,
        |c| {
            format!(
                "{}: {} -> {}",
                c.item,
                output::paint_state(c.previous.as_deref().unwrap_or("-"), color),
                output::paint_state(&c.state, color)
            )
        },
        |c| c.state.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn get(
    engine: &SyncEngine,
    identifier: &str,
    refresh: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut item = util::resolve_item(engine, identifier)?;
    if refresh {
        engine.refresh_state(&item.link).await?;
        item = util::resolve_item(engine, &item.link)?;
    }

    let color = output::should_color(global.color);
    let view = ItemView::from(&item);
    let out = output::render_single(
        global.output,
        &view,
        |v| detail(v, color),
        |v| v.state.clone().unwrap_or_default(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn set(
    engine: &SyncEngine,
    identifier: &str,
    value: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let item = util::resolve_item(engine, identifier)?;
    let state = engine.send_state(&item.link, value).await?;
    print_change(
        &StateChange {
            item: item.id,
            previous: item.state,
            state,
        },
        global,
    )
}

pub async fn toggle(
    engine: &SyncEngine,
    identifier: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let item = util::resolve_item(engine, identifier)?;
    let state = engine.toggle_state(&item.link).await?;
    print_change(
        &StateChange {
            item: item.id,
            previous: item.state,
            state,
        },
        global,
    )
}

pub async fn dim(engine: &SyncEngine, args: &DimArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if args.min > args.max {
        return Err(CliError::Validation {
            field: "min".into(),
            reason: format!("--min {} is above --max {}", args.min, args.max),
        });
    }

    let item = util::resolve_item(engine, &args.item)?;
    let state = engine
        .adjust_state(&item.link, args.delta, args.min, args.max)
        .await
        .map_err(|e| match CliError::from(e) {
            CliError::NotNumeric { value, .. } => CliError::NotNumeric {
                item: item.id.clone(),
                value,
            },
            other => other,
        })?;
    print_change(
        &StateChange {
            item: item.id,
            previous: item.state,
            state,
        },
        global,
    )
}
