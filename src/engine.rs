use serde::Serialize;
use tracing::debug;

use crate::error::{Result, SqlError};
use crate::executor;
use crate::parser::parse_query;
use crate::resolver::Resolver;
use crate::result::ResultRow;
use crate::table::TableSet;

/// Parses, binds and runs one query against `tables`.
///
/// # Example
/// ```
/// # use forest_sql::{Table, TableSet, Value, execute};
/// let animals = Table::with_rows(
///     "forest_animals",
///     vec!["name".into(), "age".into()],
///     vec![
///         vec![Value::from("Ollie"), Value::Int(3)],
///         vec![Value::from("Bella"), Value::Int(5)],
///     ],
/// )
/// .unwrap();
/// let tables = TableSet::from_tables([animals]).unwrap();
///
/// let rows = execute("SELECT name FROM forest_animals WHERE age > 3", &tables).unwrap();
/// assert_eq!(rows.len(), 1);
/// assert_eq!(rows[0].get("name"), Some(&Value::from("Bella")));
/// ```
///
/// # Errors
/// Any [SqlError]; the first failing stage stops the query.
pub fn execute(query: &str, tables: &TableSet) -> Result<Vec<ResultRow>> {
    let select = parse_query(query)?;
    let plan = Resolver::new(tables).resolve(&select)?;
    let rows = executor::run(&plan)?;
    debug!(rows = rows.len(), "query executed");
    Ok(rows)
}

impl TableSet {
    /// Runs a query against this set, see [execute].
    pub fn query(&self, sql: &str) -> Result<Vec<ResultRow>> {
        execute(sql, self)
    }
}

/// The boundary shape of an execution: `{ "rows": [...] }` or
/// `{ "error": "..." }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutcome {
    Rows { rows: Vec<ResultRow> },
    Error { error: String },
}

impl QueryOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

impl From<Result<Vec<ResultRow>>> for QueryOutcome {
    fn from(result: Result<Vec<ResultRow>>) -> Self {
        match result {
            Ok(rows) => Self::Rows { rows },
            Err(err) => Self::from(err),
        }
    }
}

impl From<SqlError> for QueryOutcome {
    fn from(err: SqlError) -> Self {
        Self::Error {
            error: err.to_string(),
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
            vec!["id".into(), "name".into()],
            vec![
                vec![Value::Int(1), Value::from("Ollie")],
                vec![Value::Int(2), Value::from("Felix")],
            ],
        )
        .unwrap();
        let habitats = Table::with_rows(
            "animal_habitats",
            vec!["animal_id".into(), "location".into()],
            vec![
                vec![Value::Int(2), Value::from("Berry Bush")],
                vec![Value::Int(1), Value::from("Tall Oak")],
                vec![Value::Int(1), Value::from("Hollow Tree")],
            ],
        )
        .unwrap();
        TableSet::from_tables([animals, habitats]).unwrap()
    }

    #[test]
    fn test_execute_join_scenario() {
        let rows = tables()
            .query(
                "SELECT a.name, h.location FROM forest_animals a JOIN animal_habitats h ON a.id = h.animal_id",
            )
            .unwrap();

        let pairs: Vec<(String, String)> = rows
            .iter()
            .map(|row| {
                (
                    row.get("name").map(Value::to_string).unwrap_or_default(),
                    row.get("location").map(Value::to_string).unwrap_or_default(),
                )
            })
            .collect();
        // left-row-major, right-row-minor
        assert_eq!(
            pairs,
            vec![
                ("Ollie".to_string(), "Tall Oak".to_string()),
                ("Ollie".to_string(), "Hollow Tree".to_string()),
                ("Felix".to_string(), "Berry Bush".to_string()),
            ]
        );
    }

    #[test]
    fn test_outcome_serialization() {
        let tables = tables();

        let ok =
            QueryOutcome::from(execute("SELECT name FROM forest_animals WHERE id = 2", &tables));
        assert_eq!(
            serde_json::to_string(&ok).unwrap(),
            r#"{"rows":[{"name":"Felix"}]}"#
        );

        let err = QueryOutcome::from(execute("SELECT name FROM trees", &tables));
        assert!(err.is_error());
        assert_eq!(
            serde_json::to_string(&err).unwrap(),
            r#"{"error":"Table 'trees' not found. Available tables: animal_habitats, forest_animals"}"#
        );
    }

    #[test]
    fn test_nesting_limit_is_a_query_error() {
        let tables = tables();
        let sql = format!(
            "SELECT name FROM forest_animals WHERE {}id = 2{}",
            "(".repeat(10_000),
            ")".repeat(10_000)
        );
        let err = execute(&sql, &tables).unwrap_err();
        assert_eq!(err.kind(), "ExpressionError");

        let sql = format!(
            "SELECT name FROM forest_animals WHERE {}id = 2{}",
            "(".repeat(20),
            ")".repeat(20)
        );
        let rows = execute(&sql, &tables).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Value::from("Felix")));
    }

    #[test]
    fn test_tables_are_not_mutated() {
        let tables = tables();
        let before = tables.clone();
        let _ = execute("SELECT * FROM forest_animals ORDER BY name DESC LIMIT 1", &tables);
        assert_eq!(tables, before);
    }
}
