use serde::{Deserialize, Serialize};

use crate::result::ResultRow;

/// How two result sets are matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareOptions {
    /// Require rows in the same order. When false, both sides are sorted
    /// by canonical form before comparing, since a query without ORDER BY
    /// has no defined row order.
    pub order_sensitive: bool,
}

/// Canonical form of each row, see [ResultRow::canonical].
pub fn canonical_rows(rows: &[ResultRow]) -> Vec<String> {
    rows.iter().map(ResultRow::canonical).collect()
}

/// Compares two result sets with the default options (row order ignored).
///
/// # Example
/// ```
/// # use forest_sql::{ResultRow, Value, compare_results};
/// let a: ResultRow = [("name", Value::from("Ollie")), ("age", Value::Int(3))]
///     .into_iter()
///     .collect();
/// let b: ResultRow = [("age", Value::Int(3)), ("name", Value::from("Ollie"))]
///     .into_iter()
///     .collect();
/// assert!(compare_results(&[a], &[b]));
/// ```
pub fn compare_results(a: &[ResultRow], b: &[ResultRow]) -> bool {
    compare_results_with(a, b, CompareOptions::default())
}

pub fn compare_results_with(a: &[ResultRow], b: &[ResultRow], options: CompareOptions) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut left = canonical_rows(a);
    let mut right = canonical_rows(b);
    if !options.order_sensitive {
        left.sort_unstable();
        right.sort_unstable();
    }
    left == right
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    fn row(name: &str, age: i64) -> ResultRow {
        [("name", Value::from(name)), ("age", Value::Int(age))]
            .into_iter()
            .collect()
    }

    const STRICT: CompareOptions = CompareOptions {
        order_sensitive: true,
    };

    #[test]
    fn test_reflexive() {
        let rows = vec![row("Ollie", 3), row("Felix", 2)];
        assert!(compare_results(&rows, &rows));
        assert!(compare_results_with(&rows, &rows, STRICT));
        assert!(compare_results(&[], &[]));
    }

    #[test]
    fn test_length_mismatch() {
        let rows = vec![row("Ollie", 3), row("Felix", 2)];
        assert!(!compare_results(&rows, &rows[..1]));
    }

    #[test]
    fn test_row_order() {
        let rows = vec![row("Ollie", 3), row("Felix", 2)];
        let reversed: Vec<ResultRow> = rows.iter().rev().cloned().collect();

        assert!(compare_results(&rows, &reversed));
        assert!(!compare_results_with(&rows, &reversed, STRICT));
    }

    #[test]
    fn test_values_must_match() {
        assert!(!compare_results(&[row("Ollie", 3)], &[row("Ollie", 4)]));
        // integral floats render like integers
        let float_row: ResultRow = [("name", Value::from("Ollie")), ("age", Value::Float(3.0))]
            .into_iter()
            .collect();
        assert!(compare_results(&[row("Ollie", 3)], &[float_row]));
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: CompareOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, CompareOptions::default());
        let options: CompareOptions = serde_json::from_str(r#"{"order_sensitive":true}"#).unwrap();
        assert_eq!(options, STRICT);
    }
}
