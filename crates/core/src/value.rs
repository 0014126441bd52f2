use std::fmt;

use serde::{Deserialize, Serialize};

/// A single scalar cell of a query result.
///
/// Warehouses ship every cell as a string; the column's declared type decides
/// which variant it becomes (see [`Value::from_typed`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Convert a raw cell into a typed value using the column type name
    /// (`INT`, `BIGINT`, `DOUBLE`, `DECIMAL(10,2)`, `BOOLEAN`, ...).
    ///
    /// Cells that do not parse as their declared type are kept as text rather
    /// than dropped.
    pub fn from_typed(type_name: &str, raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Value::Null;
        };
        let base = type_name
            .split('(')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_uppercase();

        match base.as_str() {
            "BYTE" | "TINYINT" | "SHORT" | "SMALLINT" | "INT" | "INTEGER" | "LONG" | "BIGINT" => raw
                .parse::<i64>()
                .map(Value::Int)
                .unwrap_or_else(|_| Value::Text(raw.to_string())),
            "FLOAT" | "REAL" | "DOUBLE" | "DECIMAL" | "DEC" | "NUMERIC" => raw
                .parse::<f64>()
                .map(Value::Float)
                .unwrap_or_else(|_| Value::Text(raw.to_string())),
            "BOOLEAN" | "BOOL" => match raw.to_ascii_lowercase().as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::Text(raw.to_string()),
            },
            _ => Value::Text(raw.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Extract as string, returning None for non-text values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of the value; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_conversion_by_column_type() {
        assert_eq!(Value::from_typed("LONG", Some("42")), Value::Int(42));
        assert_eq!(Value::from_typed("int", Some("-7")), Value::Int(-7));
        assert_eq!(Value::from_typed("DOUBLE", Some("1.5")), Value::Float(1.5));
        assert_eq!(Value::from_typed("DECIMAL(18,2)", Some("10.25")), Value::Float(10.25));
        assert_eq!(Value::from_typed("BOOLEAN", Some("true")), Value::Bool(true));
        assert_eq!(Value::from_typed("DATE", Some("1995-01-01")), Value::Text("1995-01-01".into()));
        assert_eq!(Value::from_typed("STRING", None), Value::Null);
    }

    #[test]
    fn unparseable_numbers_stay_text() {
        assert_eq!(Value::from_typed("BIGINT", Some("NaN-ish")), Value::Text("NaN-ish".into()));
        assert_eq!(Value::from_typed("BOOLEAN", Some("yes")), Value::Text("yes".into()));
    }

    #[test]
    fn serializes_as_plain_json_scalars() {
        let row = vec![Value::Null, Value::Int(1), Value::Float(2.5), Value::Bool(false), "x".into()];
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"[null,1,2.5,false,"x"]"#);
    }

    #[test]
    fn numeric_accessors() {
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert!(Value::Float(0.1).is_numeric());
        assert!(!Value::Text("1".into()).is_numeric());
        assert_eq!(Value::Text("a".into()).as_i64(), None);
        assert!(Value::Null.is_null());
        assert_eq!(Value::Null.to_string(), "");
    }
}
