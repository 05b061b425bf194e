// ── Numeric state helpers ──
//
// openHAB states carry units and decoration ("42 %", "5.2 MB/s"), so
// numeric commands work on the leading signed decimal only.

/// Binary switch state as openHAB spells it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[strum(serialize_all = "UPPERCASE")]
pub enum OnOff {
    On,
    Off,
}

impl OnOff {
    pub fn toggled(self) -> Self {
        match self {
            Self::On => Self::Off,
            Self::Off => Self::On,
        }
    }
}

/// Split a raw state into its leading signed decimal and the rest.
///
/// Leading whitespace is skipped. At least one digit is required; a
/// trailing `.` with no fraction digits is not consumed. The remainder is
/// returned trimmed.
pub fn split_numeric(raw: &str) -> Option<(f64, &str)> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }

    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut digits = end - int_start;

    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while bytes.get(frac_end).is_some_and(u8::is_ascii_digit) {
            frac_end += 1;
        }
        if frac_end > frac_start {
            digits += frac_end - frac_start;
            end = frac_end;
        }
    }

    if digits == 0 {
        return None;
    }

    let value = s.get(..end)?.parse::<f64>().ok()?;
    Some((value, s.get(end..).unwrap_or_default().trim()))
}

/// Leading signed decimal of a raw state, or `None` if there is none.
pub fn extract_numeric(raw: &str) -> Option<f64> {
    split_numeric(raw).map(|(value, _)| value)
}

/// Restrict `value` to the inclusive range `[min, max]`.
pub fn clamp<T: PartialOrd>(value: T, min: T, max: T) -> T {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// Render a number the way openHAB accepts it as a command: integral
/// values without a fraction.
pub fn format_number(value: f64) -> String {
    if value.fract().abs() < f64::EPSILON && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_leading_number() {
        assert_eq!(extract_numeric("42 %"), Some(42.0));
        assert_eq!(extract_numeric("-3.5 MB/s"), Some(-3.5));
        assert_eq!(extract_numeric("  17"), Some(17.0));
        assert_eq!(extract_numeric("+8.25°C"), Some(8.25));
        assert_eq!(extract_numeric(".5"), Some(0.5));
    }

    #[test]
    fn non_numeric_is_none() {
        assert_eq!(extract_numeric("ON"), None);
        assert_eq!(extract_numeric("NULL"), None);
        assert_eq!(extract_numeric(""), None);
        assert_eq!(extract_numeric("-"), None);
        assert_eq!(extract_numeric("."), None);
    }

    #[test]
    fn trailing_dot_is_not_consumed() {
        assert_eq!(split_numeric("12. units"), Some((12.0, ". units")));
    }

    #[test]
    fn split_returns_unit() {
        assert_eq!(split_numeric("5.2 MB/s"), Some((5.2, "MB/s")));
        assert_eq!(split_numeric("100"), Some((100.0, "")));
    }

    #[test]
    fn clamps_to_range() {
        assert_eq!(clamp(150, 0, 100), 100);
        assert_eq!(clamp(-5, 0, 100), 0);
        assert_eq!(clamp(50, 0, 100), 50);
        assert!((clamp(100.5_f64, 0.0, 100.0) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn on_off_round_trips_wire_spelling() {
        assert_eq!(OnOff::On.to_string(), "ON");
        assert_eq!("OFF".parse::<OnOff>().ok(), Some(OnOff::Off));
        assert_eq!(OnOff::On.toggled(), OnOff::Off);
        assert!("on".parse::<OnOff>().is_err());
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(60.0), "60");
        assert_eq!(format_number(-2.0), "-2");
        assert_eq!(format_number(12.5), "12.5");
    }
}
