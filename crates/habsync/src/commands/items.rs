//! Catalog listing.

use serde::Serialize;
use tabled::Tabled;

use habsync_core::{Item, SyncEngine};

use crate::cli::{GlobalOpts, ItemsArgs, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util::or_dash;

// ── Views ───────────────────────────────────────────────────────────

/// Serialized shape of an item in CLI output.
#[derive(Debug, Serialize)]
pub struct ItemView {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub group: Option<String>,
    pub category: Option<String>,
    pub state: Option<String>,
    pub display: String,
    pub link: String,
}

impl From<&Item> for ItemView {
    fn from(item: &Item) -> Self {
        Self {
            name: item.id.clone(),
            label: item.label.clone(),
            item_type: item.item_type.clone(),
            group: item.group.clone(),
            category: item.category.clone(),
            state: item.state.clone(),
            display: item.display_state(),
            link: item.link.clone(),
        }
    }
}

#[derive(Tabled)]
struct ItemRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Type")]
    item_type: String,
    #[tabled(rename = "Group")]
    group: String,
    #[tabled(rename = "State")]
    state: String,
}

impl ItemRow {
    fn new(item: &ItemView, color: bool) -> Self {
        Self {
            name: item.name.clone(),
            label: item.label.clone(),
            item_type: item.item_type.clone(),
            group: or_dash(item.group.as_deref()),
            state: output::paint_state(&item.display, color),
        }
    }
}

#[derive(Serialize)]
struct GroupView {
    group: String,
    items: Vec<ItemView>,
}

// ── Filtering ───────────────────────────────────────────────────────

fn matches(item: &Item, args: &ItemsArgs) -> bool {
    let kind_ok = args.kind.as_deref().is_none_or(|kind| {
        item.kind.to_string().eq_ignore_ascii_case(kind) || item.item_type.eq_ignore_ascii_case(kind)
    });
    let text_ok = args.filter.as_deref().is_none_or(|needle| {
        let needle = needle.to_lowercase();
        item.id.to_lowercase().contains(&needle) || item.label.to_lowercase().contains(&needle)
    });
    kind_ok && text_ok
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(engine: &SyncEngine, args: &ItemsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(global.color);

    if args.grouped {
        let groups: Vec<GroupView> = engine
            .grouped_catalog(|item| matches(item, args))
            .iter()
            .map(|g| GroupView {
                group: g.label().to_owned(),
                items: g.items.iter().map(ItemView::from).collect(),
            })
            .collect();

        let out = match global.output {
            OutputFormat::Table => groups
                .iter()
                .map(|g| {
                    let rows: Vec<ItemRow> =
                        g.items.iter().map(|i| ItemRow::new(i, color)).collect();
                    format!(
                        "{}\n{}",
                        output::heading(&g.group, color),
                        output::render_table(&rows)
                    )
                })
                .collect::<Vec<_>>()
                .join("\n\n"),
            OutputFormat::Plain => groups
                .iter()
                .flat_map(|g| g.items.iter().map(move |i| format!("{}\t{}", g.group, i.name)))
                .collect::<Vec<_>>()
                .join("\n"),
            format => output::render_single(format, &groups, |_| String::new(), |_| String::new())?,
        };
        output::print_output(&out, global.quiet);
        return Ok(());
    }

    let items: Vec<ItemView> = engine
        .items()
        .iter()
        .filter(|item| matches(item, args))
        .map(ItemView::from)
        .collect();

    let out = output::render_list(
        global.output,
        &items,
        |i| ItemRow::new(i, color),
        |i| i.name.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
