use std::fmt;

/// Runtime type of a non-null cell.
///
/// Fixture tables are untyped JSON, so the type lives on each [Value](crate::Value)
/// rather than on the column. It is mostly used to word type errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// A 64-bit signed integer.
    Int,
    /// A 64-bit floating-point number.
    Float,
    /// A UTF-8 string.
    Text,
    /// A boolean value (true or false).
    Bool,
}

impl DataType {
    /// Int and Float both behave as numbers in arithmetic and aggregates.
    pub fn is_numeric(self) -> bool {
        matches!(self, DataType::Int | DataType::Float)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Int => "int",
            DataType::Float => "float",
            DataType::Text => "text",
            DataType::Bool => "bool",
        };
        f.write_str(name)
    }
}
