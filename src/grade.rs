use serde::Serialize;
use tracing::{debug, warn};

use crate::compare::compare_results_with;
use crate::config::EngineConfig;
use crate::engine::execute;
use crate::result::ResultRow;
use crate::table::TableSet;

pub const NO_QUERY: &str = "No query provided. Please enter a SQL query.";
pub const CORRECT: &str = "Great job! Your query produced the correct results.";
pub const MISMATCH: &str = "Your query executed successfully, but the results don't match \
                            what we expected. Try again or check the hint!";

/// Outcome of checking a learner's answer against a level's solution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    #[serde(rename = "success")]
    pub passed: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<ResultRow>>,
    #[serde(rename = "expectedResult", skip_serializing_if = "Option::is_none")]
    pub expected: Option<Vec<ResultRow>>,
}

impl Verdict {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            result: None,
            expected: None,
        }
    }
}

/// Runs the learner's `query` and the level's `solution` against the same
/// tables and compares the results.
///
/// # Example
/// ```
/// # use forest_sql::{EngineConfig, Table, TableSet, Value, check_answer};
/// let animals = Table::with_rows(
///     "forest_animals",
///     vec!["name".into(), "age".into()],
///     vec![vec![Value::from("Ollie"), Value::Int(3)]],
/// )
/// .unwrap();
/// let tables = TableSet::from_tables([animals]).unwrap();
///
/// let verdict = check_answer(
///     "select NAME from FOREST_ANIMALS",
///     "SELECT name FROM forest_animals",
///     &tables,
///     &EngineConfig::default(),
/// );
/// assert!(verdict.passed);
/// ```
pub fn check_answer(
    query: &str,
    solution: &str,
    tables: &TableSet,
    config: &EngineConfig,
) -> Verdict {
    if query.trim().is_empty() {
        return Verdict::failed(NO_QUERY);
    }

    let result = match execute(query, tables) {
        Ok(rows) => rows,
        Err(err) => {
            debug!(kind = err.kind(), error = %err, "learner query failed");
            return Verdict::failed(format!("SQL Error: {err}"));
        }
    };

    let expected = match execute(solution, tables) {
        Ok(rows) => rows,
        Err(err) => {
            warn!(
                kind = err.kind(),
                error = %err,
                solution,
                "reference solution failed to execute"
            );
            return Verdict {
                result: Some(result),
                ..Verdict::failed(format!(
                    "The reference solution for this level could not be executed: {err}"
                ))
            };
        }
    };

    if compare_results_with(&result, &expected, config.compare_options()) {
        Verdict {
            passed: true,
            message: CORRECT.to_string(),
            result: Some(result),
            expected: None,
        }
    } else {
        Verdict {
            passed: false,
            message: MISMATCH.to_string(),
            result: Some(result),
            expected: Some(expected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;
    use crate::table::Table;

    fn tables() -> TableSet {
        let animals = Table::with_rows(
            "forest_animals",
            vec!["id".into(), "name".into(), "age".into()],
            vec![
                vec![Value::Int(1), Value::from("Ollie"), Value::Int(3)],
                vec![Value::Int(2), Value::from("Felix"), Value::Int(2)],
                vec![Value::Int(3), Value::from("Bella"), Value::Int(5)],
            ],
        )
        .unwrap();
        TableSet::from_tables([animals]).unwrap()
    }

    fn check(query: &str, solution: &str, config: EngineConfig) -> Verdict {
        check_answer(query, solution, &tables(), &config)
    }

    #[test]
    fn test_empty_query() {
        let verdict = check("   ", "SELECT * FROM forest_animals", EngineConfig::default());
        assert_eq!(verdict, Verdict::failed(NO_QUERY));
    }

    #[test]
    fn test_learner_error_is_prefixed() {
        let verdict = check(
            "DELETE FROM forest_animals",
            "SELECT * FROM forest_animals",
            EngineConfig::default(),
        );
        assert!(!verdict.passed);
        assert_eq!(
            verdict.message,
            "SQL Error: Only SELECT statements are supported in this learning environment."
        );
        assert!(verdict.result.is_none());
    }

    #[test]
    fn test_correct_answer() {
        let verdict = check(
            "SELECT age, name FROM forest_animals WHERE age >= 3",
            "SELECT name, age FROM forest_animals WHERE age > 2",
            EngineConfig::default(),
        );
        assert!(verdict.passed, "{}", verdict.message);
        assert_eq!(verdict.message, CORRECT);
        assert_eq!(verdict.result.map(|rows| rows.len()), Some(2));
        assert!(verdict.expected.is_none());
    }

    #[test]
    fn test_mismatch_carries_expected() {
        let verdict = check(
            "SELECT name FROM forest_animals",
            "SELECT name FROM forest_animals WHERE age > 2",
            EngineConfig::default(),
        );
        assert!(!verdict.passed);
        assert_eq!(verdict.message, MISMATCH);
        assert_eq!(verdict.expected.map(|rows| rows.len()), Some(2));
    }

    #[test]
    fn test_row_order_follows_config() {
        let query = "SELECT name FROM forest_animals ORDER BY name";
        let solution = "SELECT name FROM forest_animals";

        assert!(check(query, solution, EngineConfig::default()).passed);
        let strict = EngineConfig {
            order_sensitive_compare: true,
        };
        assert!(!check(query, solution, strict).passed);
    }

    #[test]
    fn test_broken_solution() {
        let verdict = check(
            "SELECT name FROM forest_animals",
            "SELECT name FROM trees",
            EngineConfig::default(),
        );
        assert!(!verdict.passed);
        assert!(verdict.message.contains("reference solution"));
        assert!(verdict.result.is_some());
    }

    #[test]
    fn test_verdict_json_shape() {
        let verdict = check(
            "SELECT name FROM forest_animals WHERE id = 1",
            "SELECT name FROM forest_animals WHERE id = 2",
            EngineConfig::default(),
        );
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["success"], serde_json::json!(false));
        assert_eq!(json["result"], serde_json::json!([{ "name": "Ollie" }]));
        assert_eq!(json["expectedResult"], serde_json::json!([{ "name": "Felix" }]));
    }
}
