//! Culture-invariant integer formatting.
//!
//! Supported format strings for `{{name:format}}` tokens:
//!
//! | Format | Meaning | `42` | `-5` |
//! |--------|---------|------|------|
//! | `D4`, `d4` | zero-pad magnitude | `0042` | `-0005` |
//! | `X4`, `x4` | hexadecimal | `002A` / `002a` | two's complement |
//! | `000` | zero-pad to the run length | `042` | `-005` |
//! | `N0`, `n0` | plain integer | `42` | `-5` |
//!
//! Anything else leaves the value unchanged.

/// Render `value`, zero-padding the magnitude to `width` digits.
///
/// The sign is not counted in the width: `-5` padded to 3 is `-005`.
pub fn pad_integer(value: i64, width: Option<usize>) -> String {
    match width {
        Some(width) if width > 0 => {
            let sign = if value < 0 { "-" } else { "" };
            format!("{sign}{:0width$}", value.unsigned_abs())
        }
        _ => value.to_string(),
    }
}

/// Apply a numeric format to `value` if it parses as an integer.
pub fn apply_format(value: &str, format: Option<&str>) -> String {
    let Some(format) = format.filter(|f| !f.is_empty()) else {
        return value.to_string();
    };
    let Ok(number) = value.trim().parse::<i64>() else {
        return value.to_string();
    };

    format_integer(number, format).unwrap_or_else(|| value.to_string())
}

fn format_integer(number: i64, format: &str) -> Option<String> {
    if !format.is_empty() && format.chars().all(|c| c == '0') {
        return Some(pad_integer(number, Some(format.len())));
    }

    let mut chars = format.chars();
    let specifier = chars.next()?;
    let precision = chars.as_str();
    let width = if precision.is_empty() {
        0
    } else {
        precision.parse::<usize>().ok()?
    };

    match specifier {
        'D' | 'd' => Some(pad_integer(number, Some(width))),
        'X' => Some(format!("{number:0width$X}")),
        'x' => Some(format!("{number:0width$x}")),
        'N' | 'n' if width == 0 => Some(number.to_string()),
        _ => None,
    }
}
