//! Output formatting: table, JSON, plain.
//!
//! Table uses `tabled`, structured formats use serde, plain emits one
//! value per line.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

/// Color an item state for terminal display.
pub fn paint_state(state: &str, color: bool) -> String {
    if !color {
        return state.to_owned();
    }
    match state {
        "ON" | "OPEN" => state.green().to_string(),
        "OFF" | "CLOSED" => state.red().to_string(),
        "NULL" | "UNDEF" => state.dimmed().to_string(),
        _ => state.to_owned(),
    }
}

/// Bold section heading.
pub fn heading(text: &str, color: bool) -> String {
    if color {
        text.bold().to_string()
    } else {
        text.to_owned()
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list in the chosen format.
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    Ok(match format {
        OutputFormat::Table => render_table(&data.iter().map(to_row).collect::<Vec<R>>()),
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
        OutputFormat::Plain => data.iter().map(id_fn).collect::<Vec<_>>().join("\n"),
    })
}

/// Render a single value; table mode uses `detail_fn`.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    plain_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize + ?Sized,
{
    Ok(match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
        OutputFormat::Plain => plain_fn(data),
    })
}

/// Print to stdout unless quiet.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

pub fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(serde::Serialize)]
    struct Row {
        name: &'static str,
    }

    #[derive(Tabled)]
    struct TableRow {
        #[tabled(rename = "Name")]
        name: &'static str,
    }

    fn rows() -> Vec<Row> {
        vec![Row { name: "Kitchen" }, Row { name: "Hall" }]
    }

    #[test]
    fn plain_is_one_value_per_line() {
        let out = render_list(
            OutputFormat::Plain,
            &rows(),
            |r| TableRow { name: r.name },
            |r| r.name.to_owned(),
        )
        .unwrap();
        assert_eq!(out, "Kitchen\nHall");
    }

    #[test]
    fn json_compact_is_single_line() {
        let out = render_list(
            OutputFormat::JsonCompact,
            &rows(),
            |r| TableRow { name: r.name },
            |r| r.name.to_owned(),
        )
        .unwrap();
        assert_eq!(out, r#"[{"name":"Kitchen"},{"name":"Hall"}]"#);
    }

    #[test]
    fn table_has_header() {
        let out = render_list(
            OutputFormat::Table,
            &rows(),
            |r| TableRow { name: r.name },
            |r| r.name.to_owned(),
        )
        .unwrap();
        assert!(out.contains("Name"));
        assert!(out.contains("Kitchen"));
    }

    #[test]
    fn uncolored_state_is_unchanged() {
        assert_eq!(paint_state("ON", false), "ON");
        assert_ne!(paint_state("ON", true), "ON");
    }
}
