//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Clamp an i64 into the u64 range, mapping negatives to zero.
#[must_use]
pub fn clamp_i64_to_u64(value: i64) -> u64 {
    cast::<i64, u64>(value.max(0)).unwrap_or(0)
}

/// Convert a usize count to u64, saturating on exotic targets.
#[must_use]
pub fn usize_to_u64(value: usize) -> u64 {
    cast::<usize, u64>(value).unwrap_or(u64::MAX)
}

/// Convert i64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn i64_to_f64(value: i64) -> f64 {
    cast::<i64, f64>(value).unwrap_or(0.0)
}

/// Convert usize to f64 while allowing precision loss in a single location.
#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(0.0)
}

/// Render an integer with comma thousands separators, e.g. `1,234,567`.
#[must_use]
pub fn format_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    let lead = digits.len() % 3;
    for (i, ch) in digits.chars().enumerate() {
        if i != 0 && (i + 3 - lead) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
