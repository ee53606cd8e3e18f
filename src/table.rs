use std::collections::HashMap;

use allocative::Allocative;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SqlError};
use crate::value::Value;

/// A row is positionally aligned with its table's column list.
pub type Row = Vec<Value>;

/// An immutable fixture table: a name, an ordered column list and row-major
/// data.
///
/// Deserializes from the fixture shape `{ "name", "columns", "data" }` and
/// validates it on the way in.
#[derive(Debug, Clone, PartialEq, Allocative, Serialize, Deserialize)]
#[serde(try_from = "TableDef")]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(rename = "data")]
    pub rows: Vec<Row>,
}

#[derive(Deserialize)]
struct TableDef {
    name: String,
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<Row>,
}

impl TryFrom<TableDef> for Table {
    type Error = SqlError;

    fn try_from(def: TableDef) -> Result<Self> {
        Table::with_rows(def.name, def.columns, def.data)
    }
}

impl Table {
    /// Creates an empty table.
    ///
    /// # Errors
    /// Returns an error if two column names are equal ignoring case.
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Result<Self> {
        let name = name.into();
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.eq_ignore_ascii_case(column)) {
                return Err(SqlError::Schema(format!(
                    "Table '{name}' declares column '{column}' more than once"
                )));
            }
        }
        Ok(Self {
            name,
            columns,
            rows: Vec::new(),
        })
    }

    /// Creates a table and inserts every row, validating each one.
    pub fn with_rows(
        name: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<Row>,
    ) -> Result<Self> {
        let mut table = Self::new(name, columns)?;
        table.rows.reserve(rows.len());
        for row in rows {
            table.insert(row)?;
        }
        Ok(table)
    }

    /// insert a new row
    pub fn insert(&mut self, values: Row) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(SqlError::Schema(format!(
                "Row of table '{}' has {} values but the table has {} columns",
                self.name,
                values.len(),
                self.columns.len()
            )));
        }
        self.rows.push(values);
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Position of a column, matched case-insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.eq_ignore_ascii_case(name))
    }

    /// Bytes of heap memory owned by this table.
    pub fn heap_size(&self) -> usize {
        allocative::size_of_unique_allocated_data(self)
    }
}

/// The tables visible to one query, keyed by lowercase name.
///
/// A set is built fresh for every request from fixture data and is never
/// mutated by query execution.
#[derive(Debug, Clone, Default, PartialEq, Allocative, Serialize, Deserialize)]
#[serde(try_from = "Vec<Table>", into = "Vec<Table>")]
pub struct TableSet {
    tables: HashMap<String, Table>,
}

impl TryFrom<Vec<Table>> for TableSet {
    type Error = SqlError;

    fn try_from(tables: Vec<Table>) -> Result<Self> {
        Self::from_tables(tables)
    }
}

impl From<TableSet> for Vec<Table> {
    fn from(set: TableSet) -> Self {
        let mut tables: Vec<Table> = set.tables.into_values().collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        tables
    }
}

impl TableSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from a list of tables.
    ///
    /// # Errors
    /// Returns an error if two tables share a name (ignoring case).
    pub fn from_tables(tables: impl IntoIterator<Item = Table>) -> Result<Self> {
        let mut set = Self::new();
        for table in tables {
            set.insert(table)?;
        }
        Ok(set)
    }

    /// Adds a table to the set.
    ///
    /// # Errors
    /// Returns an error if a table with the same name already exists.
    pub fn insert(&mut self, table: Table) -> Result<()> {
        let key = table.name.to_lowercase();
        if self.tables.contains_key(&key) {
            return Err(SqlError::Schema(format!(
                "Table '{}' already exists in the table set",
                table.name
            )));
        }
        self.tables.insert(key, table);
        Ok(())
    }

    /// Retrieves a table by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(&name.to_lowercase())
    }

    /// Table names as declared, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.values().map(|t| t.name.clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Bytes of heap memory owned by all tables in the set.
    pub fn heap_size(&self) -> usize {
        allocative::size_of_unique_allocated_data(self)
    }
}
