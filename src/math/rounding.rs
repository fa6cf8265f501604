//! Null-safe numeric coercion and rounding.
//!
//! Source extracts store numbers as JSON numbers, numeric strings, or
//! placeholders such as `""`, `"nan"`, or `"None"`. Coercion maps anything
//! that is not a finite number to `None`; rounding keeps `None` as `None`.

use serde_json::Value;

/// Field-specific decimal policy for exported numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// Dollar amounts (income, home value).
    Currency,
    /// Percentages on a 0–100 scale.
    Percent,
    /// Normalized index values (`dvi`).
    Score,
    /// Unbounded composite sums and pillar components.
    Raw,
}

impl Precision {
    pub fn decimals(self) -> i32 {
        match self {
            Precision::Currency => 0,
            Precision::Percent | Precision::Score => 1,
            Precision::Raw => 4,
        }
    }

    pub fn round(self, value: Option<f64>) -> Option<f64> {
        round_to(value, self.decimals())
    }
}

/// Round to `decimals` places; `None` for missing or non-finite input.
pub fn round_to(value: Option<f64>, decimals: i32) -> Option<f64> {
    let v = value.filter(|v| v.is_finite())?;
    let factor = 10f64.powi(decimals);
    let rounded = (v * factor).round() / factor;
    // Avoid emitting `-0.0`.
    Some(if rounded == 0.0 { 0.0 } else { rounded })
}

/// Coerce a JSON property value to a finite `f64`.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_f64(s),
        _ => None,
    }
}

/// Parse a numeric string, tolerating whitespace and thousands separators.
pub fn parse_f64(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let cleaned: String = trimmed.chars().filter(|c| *c != ',').collect();
    let v = cleaned.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

/// Render a property value as text, treating null/blank placeholders as absent.
pub fn coerce_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    };
    if text.is_empty() || text.eq_ignore_ascii_case("nan") || text == "None" {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn precision_policy_per_field_kind() {
        assert_eq!(Precision::Currency.round(Some(65432.6)), Some(65433.0));
        assert_eq!(Precision::Percent.round(Some(41.26)), Some(41.3));
        assert_eq!(Precision::Raw.round(Some(0.123456)), Some(0.1235));
        assert_eq!(Precision::Score.round(Some(f64::NAN)), None);
        assert_eq!(Precision::Score.round(None), None);
    }

    #[test]
    fn coercion_rejects_placeholders() {
        assert_eq!(coerce_f64(&json!("1,250.5")), Some(1250.5));
        assert_eq!(coerce_f64(&json!(" 7 ")), Some(7.0));
        assert_eq!(coerce_f64(&json!("n/a")), None);
        assert_eq!(coerce_f64(&json!("NaN")), None);
        assert_eq!(coerce_f64(&json!(null)), None);
        assert_eq!(coerce_f64(&json!(true)), None);
        assert_eq!(coerce_text(&json!("nan")), None);
        assert_eq!(coerce_text(&json!(" Stable ")), Some("Stable".to_string()));
        assert_eq!(coerce_text(&json!(18.32)), Some("18.32".to_string()));
    }
}
