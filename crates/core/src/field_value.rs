use serde::{Deserialize, Serialize};

/// Strings that coerce to `false`; compared case-insensitively, untrimmed.
const FALSY_STRINGS: &[&str] = &["false", "no", "0", "unchecked", "", "null"];

/// A single cell of an incoming record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Text(String),
    Number(f64),
    Boolean(bool),
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b).is_eq(),
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for FieldValue {}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, FieldValue::Boolean(_))
    }

    /// Visibility a layer gets when this value is mapped onto it.
    ///
    /// Booleans pass through, numbers are visible unless zero (or NaN), and
    /// strings are hidden only when they spell out a negative such as
    /// `"no"` or `"unchecked"`. Any other non-empty string is visible,
    /// including whitespace and padded negatives like `" no "`.
    pub fn coerce_visible(&self) -> bool {
        match self {
            FieldValue::Null => false,
            FieldValue::Boolean(b) => *b,
            FieldValue::Number(n) => *n != 0.0 && !n.is_nan(),
            FieldValue::Text(s) => {
                let normalized = s.to_lowercase();
                !FALSY_STRINGS.contains(&normalized.as_str())
            }
        }
    }

    /// Renders the value the way it should appear in a text layer or an
    /// identifier tag. Integral numbers drop their fractional part.
    pub fn to_display_string(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Text(s) => s.clone(),
            FieldValue::Boolean(b) => b.to_string(),
            FieldValue::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
        }
    }

    /// Converts a JSON cell. Nested arrays and objects are carried as their
    /// compact JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Bool(b) => FieldValue::Boolean(*b),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(FieldValue::Number)
                .unwrap_or_else(|| FieldValue::Text(n.to_string())),
            serde_json::Value::String(s) => FieldValue::Text(s.clone()),
            other => FieldValue::Text(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visible_values() {
        let cases: Vec<FieldValue> = vec![
            true.into(),
            1i64.into(),
            (-2.5f64).into(),
            "yes".into(),
            "Checked".into(),
            "TRUE".into(),
            "ok".into(),
            "Q&A".into(),
            "  ".into(),
            " no ".into(),
            "false ".into(),
        ];
        for value in cases {
            assert!(value.coerce_visible(), "{value:?} should be visible");
        }
    }

    #[test]
    fn hidden_values() {
        let cases: Vec<FieldValue> = vec![
            false.into(),
            0i64.into(),
            f64::NAN.into(),
            "no".into(),
            "".into(),
            "unchecked".into(),
            "False".into(),
            "NULL".into(),
            "0".into(),
            FieldValue::Null,
        ];
        for value in cases {
            assert!(!value.coerce_visible(), "{value:?} should be hidden");
        }
    }

    #[test]
    fn display_strings() {
        assert_eq!(FieldValue::Number(3.0).to_display_string(), "3");
        assert_eq!(FieldValue::Number(-12.0).to_display_string(), "-12");
        assert_eq!(FieldValue::Number(1.5).to_display_string(), "1.5");
        assert_eq!(FieldValue::Boolean(false).to_display_string(), "false");
        assert_eq!(FieldValue::Null.to_display_string(), "");
        assert_eq!(FieldValue::from("abc").to_display_string(), "abc");
    }

    #[test]
    fn json_cells() {
        let value: serde_json::Value =
            serde_json::from_str(r#"[null, true, 42, "x", {"a": 1}, [1, 2]]"#).unwrap();
        let cells: Vec<FieldValue> = value
            .as_array()
            .unwrap()
            .iter()
            .map(FieldValue::from_json)
            .collect();
        assert_eq!(cells[0], FieldValue::Null);
        assert_eq!(cells[1], FieldValue::Boolean(true));
        assert_eq!(cells[2], FieldValue::Number(42.0));
        assert_eq!(cells[3], FieldValue::Text("x".into()));
        assert_eq!(cells[4], FieldValue::Text(r#"{"a":1}"#.into()));
        assert_eq!(cells[5], FieldValue::Text("[1,2]".into()));
    }
}
