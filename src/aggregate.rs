use std::cmp::Ordering;

use crate::Value;
use crate::ast::AggregateFn;
use crate::error::{Result, SqlError};

/// Running state of one aggregate call over one group.
///
/// NULL inputs are skipped by every function. `SUM`, `AVG`, `MIN` and `MAX`
/// accept only numbers.
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    Count(i64),
    Sum(Option<Value>),
    Avg { total: f64, count: usize },
    Min(Option<Value>),
    Max(Option<Value>),
}

impl Accumulator {
    pub fn new(func: AggregateFn) -> Self {
        match func {
            AggregateFn::Count => Self::Count(0),
            AggregateFn::Sum => Self::Sum(None),
            AggregateFn::Avg => Self::Avg {
                total: 0.0,
                count: 0,
            },
            AggregateFn::Min => Self::Min(None),
            AggregateFn::Max => Self::Max(None),
        }
    }

    fn func(&self) -> AggregateFn {
        match self {
            Self::Count(_) => AggregateFn::Count,
            Self::Sum(_) => AggregateFn::Sum,
            Self::Avg { .. } => AggregateFn::Avg,
            Self::Min(_) => AggregateFn::Min,
            Self::Max(_) => AggregateFn::Max,
        }
    }

    /// Counts a row for `COUNT(*)`.
    pub fn count_row(&mut self) {
        if let Self::Count(n) = self {
            *n += 1;
        }
    }

    /// Feeds one value of the argument expression.
    ///
    /// # Errors
    /// Returns [SqlError::Type] when a numeric aggregate receives a value that
    /// is not a number.
    pub fn update(&mut self, value: Value) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        if let Self::Count(n) = self {
            *n += 1;
            return Ok(());
        }

        let Some(number) = value.as_number() else {
            return Err(SqlError::Type(format!(
                "{}() expects numeric values, found {}",
                self.func().to_string().to_uppercase(),
                value.describe()
            )));
        };

        match self {
            Self::Count(_) => {}
            Self::Sum(total) => {
                *total = Some(match (total.take(), value) {
                    (None, value) => value,
                    (Some(Value::Int(l)), Value::Int(r)) => match l.checked_add(r) {
                        Some(sum) => Value::Int(sum),
                        None => Value::Float(l as f64 + r as f64),
                    },
                    (Some(previous), _) => {
                        Value::Float(previous.as_number().unwrap_or_default() + number)
                    }
                });
            }
            Self::Avg { total, count } => {
                *total += number;
                *count += 1;
            }
            Self::Min(current) => keep_if(current, value, Ordering::Less),
            Self::Max(current) => keep_if(current, value, Ordering::Greater),
        }
        Ok(())
    }

    /// Final value; an aggregate that saw no values yields NULL (COUNT
    /// yields 0).
    pub fn finish(self) -> Value {
        match self {
            Self::Count(n) => Value::Int(n),
            Self::Sum(total) | Self::Min(total) | Self::Max(total) => {
                total.unwrap_or(Value::Null)
            }
            Self::Avg { count: 0, .. } => Value::Null,
            Self::Avg { total, count } => Value::Float(total / count as f64),
        }
    }
}

/// Replaces `current` with `candidate` when it compares as `wanted`.
fn keep_if(current: &mut Option<Value>, candidate: Value, wanted: Ordering) {
    let replace = match current {
        None => true,
        Some(existing) => {
            let l = candidate.as_number().unwrap_or(f64::NAN);
            let r = existing.as_number().unwrap_or(f64::NAN);
            l.partial_cmp(&r) == Some(wanted)
        }
    };
    if replace {
        *current = Some(candidate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(func: AggregateFn, values: &[Value]) -> Result<Value> {
        let mut acc = Accumulator::new(func);
        for value in values {
            acc.update(value.clone())?;
        }
        Ok(acc.finish())
    }

    #[test]
    fn test_count_skips_nulls() {
        let values = [Value::Int(1), Value::Null, Value::from("Owl")];
        assert_eq!(run(AggregateFn::Count, &values).unwrap(), Value::Int(2));

        let mut star = Accumulator::new(AggregateFn::Count);
        star.count_row();
        star.count_row();
        assert_eq!(star.finish(), Value::Int(2));
    }

    #[test]
    fn test_sum_keeps_integers() {
        let ints = [Value::Int(3), Value::Int(2), Value::Null, Value::Int(5)];
        assert_eq!(run(AggregateFn::Sum, &ints).unwrap(), Value::Int(10));

        let mixed = [Value::Int(3), Value::Float(0.5)];
        assert_eq!(run(AggregateFn::Sum, &mixed).unwrap(), Value::Float(3.5));

        let overflow = [Value::Int(i64::MAX), Value::Int(1)];
        assert!(matches!(
            run(AggregateFn::Sum, &overflow).unwrap(),
            Value::Float(_)
        ));
    }

    #[test]
    fn test_avg_is_float_division() {
        let values = [Value::Int(3), Value::Int(2), Value::Int(5), Value::Int(1), Value::Int(4)];
        assert_eq!(run(AggregateFn::Avg, &values).unwrap(), Value::Float(3.0));

        let values = [Value::Int(1), Value::Int(2)];
        assert_eq!(run(AggregateFn::Avg, &values).unwrap(), Value::Float(1.5));
    }

    #[test]
    fn test_min_max_keep_value_type() {
        let values = [Value::Int(3), Value::Float(1.5), Value::Int(5)];
        assert_eq!(run(AggregateFn::Min, &values).unwrap(), Value::Float(1.5));
        assert_eq!(run(AggregateFn::Max, &values).unwrap(), Value::Int(5));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(run(AggregateFn::Count, &[]).unwrap(), Value::Int(0));
        assert_eq!(run(AggregateFn::Sum, &[]).unwrap(), Value::Null);
        assert_eq!(run(AggregateFn::Avg, &[Value::Null]).unwrap(), Value::Null);
        assert_eq!(run(AggregateFn::Max, &[]).unwrap(), Value::Null);
    }

    #[test]
    fn test_non_numeric_input_is_type_error() {
        let err = run(AggregateFn::Sum, &[Value::Int(1), Value::from("Owl")]).unwrap_err();
        assert_eq!(
            err,
            SqlError::Type("SUM() expects numeric values, found text 'Owl'".into())
        );
        assert!(run(AggregateFn::Min, &[Value::Bool(true)]).is_err());
    }
}
