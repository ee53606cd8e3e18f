//! An embedded, read-only SQL engine for a SQL learning game.
//!
//! Queries run against small in-memory tables supplied by each level, and a
//! learner's answer is graded by comparing its rows with the rows of the
//! level's reference solution.
//!
//! ```
//! # use forest_sql::{Table, TableSet, Value, execute};
//! let animals = Table::with_rows(
//!     "forest_animals",
//!     vec!["name".into(), "species".into()],
//!     vec![
//!         vec![Value::from("Ollie"), Value::from("Owl")],
//!         vec![Value::from("Hooty"), Value::from("Owl")],
//!         vec![Value::from("Felix"), Value::from("Fox")],
//!     ],
//! )
//! .unwrap();
//! let tables = TableSet::from_tables([animals]).unwrap();
//!
//! let rows = execute(
//!     "SELECT species, COUNT(*) AS total FROM forest_animals GROUP BY species ORDER BY total DESC",
//!     &tables,
//! )
//! .unwrap();
//! assert_eq!(rows[0].get("species"), Some(&Value::from("Owl")));
//! assert_eq!(rows[0].get("total"), Some(&Value::Int(2)));
//! ```

pub mod aggregate;
pub mod ast;
pub mod compare;
pub mod config;
pub mod data_type;
pub mod engine;
pub mod error;
pub mod executor;
pub mod fixture;
pub mod grade;
pub mod parser;
pub mod resolver;
pub mod result;
pub mod table;
pub mod tokenizer;
pub mod value;

#[cfg(test)]
mod property_tests;

pub use compare::{CompareOptions, compare_results, compare_results_with};
pub use config::{ConfigError, EngineConfig};
pub use data_type::DataType;
pub use engine::{QueryOutcome, execute};
pub use error::{Result, SqlError};
pub use fixture::{Catalogue, Fixture, FixtureError};
pub use grade::{Verdict, check_answer};
pub use parser::parse_query;
pub use result::ResultRow;
pub use table::{Row, Table, TableSet};
pub use value::Value;
