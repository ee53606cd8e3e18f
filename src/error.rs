use thiserror::Error;

/// Every way a query can fail inside the engine.
///
/// All variants are terminal: the pipeline stops at the first error and the
/// message is shown to the learner as-is.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SqlError {
    /// A required clause is missing or the statement has no recognizable shape.
    #[error("{0}")]
    Clause(String),

    #[error("Table '{table}' not found. Available tables: {}", .available.join(", "))]
    TableNotFound {
        table: String,
        available: Vec<String>,
    },

    #[error(
        "Column '{column}' not found in table '{table}'. Available columns: {}",
        .available.join(", ")
    )]
    ColumnNotFound {
        column: String,
        table: String,
        available: Vec<String>,
    },

    /// A condition, projection or literal could not be parsed or bound.
    #[error("{0}")]
    Expression(String),

    /// The construct is valid SQL but this engine does not execute it.
    #[error("{0} is not supported in this learning environment")]
    Unsupported(String),

    /// An aggregate or comparison received values of incompatible types.
    #[error("{0}")]
    Type(String),

    #[error("{0}")]
    Limit(String),

    /// A table definition is inconsistent (row width, duplicate columns).
    #[error("{0}")]
    Schema(String),
}

impl SqlError {
    /// Stable name of the error category, used in logs and JSON payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            SqlError::Clause(_) => "ClauseError",
            SqlError::TableNotFound { .. } => "TableNotFoundError",
            SqlError::ColumnNotFound { .. } => "ColumnNotFoundError",
            SqlError::Expression(_) => "ExpressionError",
            SqlError::Unsupported(_) => "UnsupportedConstructError",
            SqlError::Type(_) => "TypeError",
            SqlError::Limit(_) => "LimitError",
            SqlError::Schema(_) => "SchemaError",
        }
    }

    pub(crate) fn unsupported(what: impl Into<String>) -> Self {
        SqlError::Unsupported(what.into())
    }
}

pub type Result<T, E = SqlError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_not_found_lists_tables() {
        let err = SqlError::TableNotFound {
            table: "trees".into(),
            available: vec!["animal_habitats".into(), "forest_animals".into()],
        };
        assert_eq!(
            err.to_string(),
            "Table 'trees' not found. Available tables: animal_habitats, forest_animals"
        );
        assert_eq!(err.kind(), "TableNotFoundError");
    }

    #[test]
    fn test_unsupported_message() {
        let err = SqlError::unsupported("HAVING clause");
        assert_eq!(
            err.to_string(),
            "HAVING clause is not supported in this learning environment"
        );
        assert_eq!(err.kind(), "UnsupportedConstructError");
    }
}
