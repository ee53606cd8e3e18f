use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use allocative::Allocative;
use serde::{Deserialize, Serialize};

use crate::data_type::DataType;
use crate::error::{Result, SqlError};

/// A single cell of a fixture table or of a query result.
///
/// Fixtures are authored as JSON, so the variants mirror JSON scalars with
/// numbers split into integers and floats. Deserialization picks `Int` for
/// integral JSON numbers and `Float` otherwise.
#[derive(Debug, Clone, PartialEq, Allocative, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// represents an empty or missing value.
    Null,
    /// A boolean value.
    Bool(bool),
    /// A 64-bit signed integer value.
    Int(i64),
    /// A 64-bit floating-point value.
    Float(f64),
    /// A UTF-8 string value, wrapped in an [Arc] so rows clone cheaply
    /// through joins and grouping.
    Text(Arc<str>),
}

impl Value {
    /// Returns `true` if the value is [Value::Null].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the inner integer value if this is a [Value::Int].
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the inner float value if this is a [Value::Float].
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns a reference to the inner string slice if this is a [Value::Text].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the inner boolean value if this is a [Value::Bool].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the numeric value of an `Int` or `Float`, without any coercion.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.data_type().is_some_and(DataType::is_numeric)
    }

    /// Returns the logical [DataType] corresponding to this value, or `None`
    /// for [Value::Null].
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Self::Null => None,
            Self::Int(_) => Some(DataType::Int),
            Self::Float(_) => Some(DataType::Float),
            Self::Text(_) => Some(DataType::Text),
            Self::Bool(_) => Some(DataType::Bool),
        }
    }

    /// Loose numeric conversion used by mixed-type comparisons: booleans
    /// become 0/1, numeric strings parse, anything else is `None`.
    pub fn coerce_number(&self) -> Option<f64> {
        match self {
            Self::Null => None,
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Text(s) => parse_numeric_text(s),
        }
    }

    /// Loose equality used by `=` and `<>` in WHERE clauses.
    ///
    /// Same-typed values compare directly; mixed numbers, numeric strings and
    /// booleans compare numerically. NULL is never equal to anything.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => false,
            (Self::Int(l), Self::Int(r)) => l == r,
            (Self::Text(l), Self::Text(r)) => l == r,
            (Self::Bool(l), Self::Bool(r)) => l == r,
            _ => match (self.coerce_number(), other.coerce_number()) {
                (Some(l), Some(r)) => l == r,
                _ => false,
            },
        }
    }

    /// Ordering used by `<`, `>`, `<=` and `>=`.
    ///
    /// Returns `Ok(None)` when either side is NULL (the comparison is false).
    /// Text compares lexicographically with text; everything else must be
    /// convertible to a number.
    ///
    /// # Errors
    /// Returns [SqlError::Type] when a non-numeric string meets a number.
    pub fn loose_cmp(&self, other: &Value) -> Result<Option<Ordering>> {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => Ok(None),
            (Self::Int(l), Self::Int(r)) => Ok(Some(l.cmp(r))),
            (Self::Text(l), Self::Text(r)) => Ok(Some(l.as_ref().cmp(r.as_ref()))),
            _ => match (self.coerce_number(), other.coerce_number()) {
                (Some(l), Some(r)) => Ok(l.partial_cmp(&r)),
                _ => Err(SqlError::Type(format!(
                    "Cannot compare {} with {}",
                    self.describe(),
                    other.describe()
                ))),
            },
        }
    }

    /// Strict equality used by join keys: no coercion between types, but
    /// `Int` and `Float` are both numbers. NULL never matches.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => false,
            (Self::Int(l), Self::Int(r)) => l == r,
            (l, r) if l.is_numeric() && r.is_numeric() => l.as_number() == r.as_number(),
            (Self::Text(l), Self::Text(r)) => l == r,
            (Self::Bool(l), Self::Bool(r)) => l == r,
            _ => false,
        }
    }

    /// Total order used by ORDER BY.
    ///
    /// NULLs first, then numbers (booleans count as 0/1) compared numerically,
    /// then text compared case-insensitively with lowercase winning ties.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Null, _) => Ordering::Less,
            (_, Self::Null) => Ordering::Greater,
            (Self::Text(l), Self::Text(r)) => locale_cmp(l, r),
            (Self::Text(_), _) => Ordering::Greater,
            (_, Self::Text(_)) => Ordering::Less,
            _ => {
                let l = self.coerce_number().unwrap_or(f64::NAN);
                let r = other.coerce_number().unwrap_or(f64::NAN);
                l.total_cmp(&r)
            }
        }
    }

    /// Canonical JSON rendering used for result comparison.
    ///
    /// Integral floats drop their fraction, so `Int(3)` and `Float(3.0)` share
    /// the form `3`. Non-finite floats render as `null`.
    pub fn canonical(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) if f.is_finite() => f.to_string(),
            Self::Float(_) => "null".to_string(),
            Self::Text(s) => serde_json::to_string(s.as_ref()).unwrap_or_default(),
        }
    }

    /// Short type-qualified rendering for error messages, e.g. `text 'Owl'`.
    pub fn describe(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Text(s) => format!("text '{s}'"),
            other => match other.data_type() {
                Some(data_type) => format!("{data_type} {other}"),
                None => other.to_string(),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(Arc::from(value))
    }
}

/// Decimal text to number. Surrounding whitespace is ignored and an empty
/// string is zero.
fn parse_numeric_text(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
    {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

/// Case-insensitive comparison; on a tie lowercase sorts before uppercase, as
/// locale collation does.
fn locale_cmp(left: &str, right: &str) -> Ordering {
    left.to_lowercase()
        .cmp(&right.to_lowercase())
        .then_with(|| right.cmp(left))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ─────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_accessors() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::Int(42).as_int(), Some(42));
        assert_eq!(Value::Float(1.5).as_float(), Some(1.5));
        assert_eq!(Value::from("Owl").as_str(), Some("Owl"));
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Text("3".into()).as_number(), None);
        assert_eq!(Value::Int(3).as_number(), Some(3.0));
    }

    #[test]
    fn test_data_type() {
        assert_eq!(Value::Null.data_type(), None);
        assert_eq!(Value::Int(1).data_type(), Some(DataType::Int));
        assert_eq!(Value::Float(1.0).data_type(), Some(DataType::Float));
        assert_eq!(Value::from("x").data_type(), Some(DataType::Text));
        assert_eq!(Value::Bool(true).data_type(), Some(DataType::Bool));
    }

    // ─────────────────────────────────────────────────────────────
    // Loose equality
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_loose_eq_numeric_strings() {
        assert!(Value::Int(3).loose_eq(&Value::from("3")));
        assert!(Value::from(" 3.0 ").loose_eq(&Value::Int(3)));
        assert!(Value::Int(3).loose_eq(&Value::Float(3.0)));
        assert!(Value::Bool(true).loose_eq(&Value::Int(1)));
        assert!(!Value::from("abc").loose_eq(&Value::Int(0)));
        assert!(!Value::from("owl").loose_eq(&Value::from("Owl")));
    }

    #[test]
    fn test_null_never_equal() {
        assert!(!Value::Null.loose_eq(&Value::Null));
        assert!(!Value::Null.loose_eq(&Value::Int(0)));
        assert!(!Value::Null.strict_eq(&Value::Null));
    }

    // ─────────────────────────────────────────────────────────────
    // Ordering comparisons
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_loose_cmp() {
        assert_eq!(
            Value::Int(5).loose_cmp(&Value::Int(3)).unwrap(),
            Some(Ordering::Greater)
        );
        assert_eq!(
            Value::from("10").loose_cmp(&Value::Int(9)).unwrap(),
            Some(Ordering::Greater)
        );
        // text against text stays lexicographic
        assert_eq!(
            Value::from("10").loose_cmp(&Value::from("9")).unwrap(),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Null.loose_cmp(&Value::Int(1)).unwrap(), None);
    }

    #[test]
    fn test_loose_cmp_type_error() {
        let err = Value::from("Owl").loose_cmp(&Value::Int(3)).unwrap_err();
        assert_eq!(err.kind(), "TypeError");
        assert!(err.to_string().contains("text 'Owl'"));
    }

    #[test]
    fn test_strict_eq_does_not_coerce() {
        assert!(Value::Int(1).strict_eq(&Value::Float(1.0)));
        assert!(!Value::Int(1).strict_eq(&Value::from("1")));
        assert!(!Value::Bool(true).strict_eq(&Value::Int(1)));
    }

    #[test]
    fn test_sort_cmp() {
        let mut values = vec![
            Value::from("bear"),
            Value::Int(3),
            Value::Null,
            Value::from("Bear"),
            Value::Float(1.5),
            Value::from("apple"),
        ];
        values.sort_by(|a, b| a.sort_cmp(b));
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Float(1.5),
                Value::Int(3),
                Value::from("apple"),
                Value::from("bear"),
                Value::from("Bear"),
            ]
        );
    }

    // ─────────────────────────────────────────────────────────────
    // Canonical form and serde
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_canonical_numbers_match_json_stringify() {
        assert_eq!(Value::Int(3).canonical(), "3");
        assert_eq!(Value::Float(3.0).canonical(), "3");
        assert_eq!(Value::Float(3.5).canonical(), "3.5");
        assert_eq!(Value::Float(f64::NAN).canonical(), "null");
        assert_eq!(Value::from("a\"b").canonical(), "\"a\\\"b\"");
    }

    #[test]
    fn test_deserialize_fixture_cells() {
        let cells: Vec<Value> = serde_json::from_str(r#"[1, 2.5, "Owl", true, null]"#).unwrap();
        assert_eq!(
            cells,
            vec![
                Value::Int(1),
                Value::Float(2.5),
                Value::from("Owl"),
                Value::Bool(true),
                Value::Null,
            ]
        );
        assert_eq!(
            serde_json::to_string(&cells).unwrap(),
            r#"[1,2.5,"Owl",true,null]"#
        );
    }
}
