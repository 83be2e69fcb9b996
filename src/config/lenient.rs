//! Forgiving numeric fields for hand-edited configuration files.
//!
//! Bounds, defaults and action parameters are often written as quoted strings
//! (`"0.5"`) or left blank by UI editors. These helpers accept a number, a
//! numeric string or a boolean, and turn anything else into "absent" with a
//! warning instead of failing the whole file.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

/// Coerce a loosely-typed config value into a finite `f64`.
///
/// # Returns
/// `None` for nulls, empty strings, non-numeric text and non-finite numbers.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Null => return None,
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok()
        }
        Value::Array(_) | Value::Object(_) => None,
    };

    match parsed {
        Some(v) if v.is_finite() => Some(v),
        _ => {
            warn!("Ignoring non-numeric config value: {}", value);
            None
        }
    }
}

/// `deserialize_with` helper for `Option<f64>` fields.
pub fn opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(coerce_f64))
}

/// `deserialize_with` helper for a `[min, max]` pair where either side may be junk.
pub fn opt_range<'de, D>(deserializer: D) -> Result<Option<(Option<f64>, Option<f64>)>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Array(items)) => {
            let lo = items.first().and_then(coerce_f64);
            let hi = items.get(1).and_then(coerce_f64);
            Some((lo, hi))
        }
        Some(Value::Null) | None => None,
        Some(other) => {
            warn!("Ignoring malformed range (expected [min, max]): {}", other);
            None
        }
    })
}
