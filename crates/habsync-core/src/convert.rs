// ── API-to-domain conversions ──
//
// `ItemDescriptor` (wire shape) → `Item` (domain shape), plus the display
// pattern formatter used for label views.

use habsync_api::ItemDescriptor;

use crate::command::numeric::split_numeric;
use crate::model::{Item, ItemKind};

impl From<ItemDescriptor> for Item {
    fn from(d: ItemDescriptor) -> Self {
        let group = d
            .primary_group()
            .filter(|g| !g.is_empty())
            .map(str::to_owned);
        let pattern = d.pattern().map(str::to_owned);
        let item_type = d.item_type.unwrap_or_default();

        Item {
            id: d.name,
            link: d.link,
            label: d.label,
            kind: ItemKind::from_type(&item_type),
            item_type,
            group,
            category: d.category.filter(|c| !c.is_empty()),
            pattern,
            state: d.state,
            watched: false,
        }
    }
}

// ── Display patterns ─────────────────────────────────────────────────

/// Render `state` through an openHAB `stateDescription.pattern`.
///
/// Supported conversions: `%s`, `%d`, `%f`, `%.Nf`, `%%` and `%unit%`.
/// Unknown conversions are copied through. When a numeric conversion meets
/// a non-numeric state (`NULL`, `UNDEF`, ...) the raw state is returned.
pub fn format_pattern(pattern: &str, state: &str) -> String {
    let parsed = split_numeric(state);
    let unit = parsed.map_or("", |(_, unit)| unit);

    // With `%unit%` present, `%s` is the bare number.
    let text = match parsed {
        Some((_, unit)) if pattern.contains("%unit%") => state
            .trim()
            .strip_suffix(unit)
            .map_or(state, str::trim_end),
        _ => state,
    };

    let mut out = String::with_capacity(pattern.len() + state.len());
    let mut rest = pattern;

    while let Some(pos) = rest.find('%') {
        let (literal, spec) = rest.split_at(pos);
        out.push_str(literal);

        if let Some(after) = spec.strip_prefix("%%") {
            out.push('%');
            rest = after;
        } else if let Some(after) = spec.strip_prefix("%unit%") {
            out.push_str(unit);
            rest = after;
        } else if let Some(after) = spec.strip_prefix("%s") {
            out.push_str(text);
            rest = after;
        } else if let Some(after) = spec.strip_prefix("%d") {
            let Some((value, _)) = parsed else {
                return state.to_owned();
            };
            out.push_str(&format!("{:.0}", value.round()));
            rest = after;
        } else if let Some((precision, after)) = float_conversion(spec) {
            let Some((value, _)) = parsed else {
                return state.to_owned();
            };
            out.push_str(&format!("{value:.precision$}"));
            rest = after;
        } else {
            out.push('%');
            rest = spec.strip_prefix('%').unwrap_or_default();
        }
    }

    out.push_str(rest);
    out
}

/// Match `%f` or `%.Nf` at the start of `spec`.
fn float_conversion(spec: &str) -> Option<(usize, &str)> {
    let body = spec.strip_prefix('%')?;
    if let Some(after) = body.strip_prefix('f') {
        return Some((6, after));
    }

    let body = body.strip_prefix('.')?;
    let digits = body.bytes().take_while(u8::is_ascii_digit).count();
    let (precision, tail) = body.split_at(digits);
    let after = tail.strip_prefix('f')?;
    Some((precision.parse().unwrap_or(0), after))
}
