//! The row pipeline: join → filter → group → aggregate → order → limit →
//! project.
//!
//! Rows stay positional (`Vec<Value>`) until the very last step, where each
//! surviving row is turned into a name-keyed [ResultRow].

use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::slice;

use bitvec::prelude::*;
use tracing::debug;

use crate::Value;
use crate::aggregate::Accumulator;
use crate::ast::{ArithmeticOp, ComparisonOp, SortDirection};
use crate::error::{Result, SqlError};
use crate::resolver::{ParsedQuery, Predicate, ScalarExpr, SortKey, Source};
use crate::result::ResultRow;
use crate::table::Row;

/// What an expression is evaluated against: one row, or one group of rows
/// in a grouped query.
#[derive(Debug, Clone, Copy)]
enum Frame<'r> {
    Row(&'r Row),
    Group(&'r [Row]),
}

/// A projected row waiting to be ordered, with its sort keys.
struct Candidate {
    row: ResultRow,
    keys: Vec<Value>,
}

/// Executes a bound query.
///
/// # Errors
/// Returns [SqlError::Type] when a comparison, arithmetic operation or
/// aggregate meets incompatible values.
pub fn run(query: &ParsedQuery<'_>) -> Result<Vec<ResultRow>> {
    let rows = join(&query.source);
    debug!(rows = rows.len(), joins = query.source.joins.len(), "source rows");

    let rows = match &query.where_condition {
        Some(predicate) => filter(rows, predicate)?,
        None => rows,
    };
    debug!(rows = rows.len(), "rows after WHERE");

    let mut candidates = if query.grouped {
        let groups = group(rows, &query.group_by);
        debug!(groups = groups.len(), "rows grouped");
        groups
            .iter()
            .map(|rows| candidate(query, Frame::Group(rows)))
            .collect::<Result<Vec<_>>>()?
    } else {
        rows.iter()
            .map(|row| candidate(query, Frame::Row(row)))
            .collect::<Result<Vec<_>>>()?
    };

    if query.distinct {
        let mut seen = HashSet::new();
        candidates.retain(|c| seen.insert(c.row.canonical()));
    }

    if !query.order_by.is_empty() {
        sort(&mut candidates, query);
    }

    let offset = query.offset.unwrap_or(0);
    let limit = query.limit.unwrap_or(usize::MAX);
    Ok(candidates
        .into_iter()
        .skip(offset)
        .take(limit)
        .map(|candidate| candidate.row)
        .collect())
}

/// Nested-loop equi-join, left-row-major.
fn join(source: &Source<'_>) -> Vec<Row> {
    let Some((primary, joined)) = source.bindings.split_first() else {
        return Vec::new();
    };

    let mut rows: Vec<Row> = primary.table.rows.clone();
    for (binding, plan) in joined.iter().zip(&source.joins) {
        let mut next = Vec::new();
        for left in &rows {
            for right in &binding.table.rows {
                if left[plan.left].strict_eq(&right[plan.right]) {
                    let mut row = Vec::with_capacity(left.len() + right.len());
                    row.extend_from_slice(left);
                    row.extend_from_slice(right);
                    next.push(row);
                }
            }
        }
        rows = next;
    }
    rows
}

/// Keeps the rows matching `predicate`, in input order.
fn filter(rows: Vec<Row>, predicate: &Predicate) -> Result<Vec<Row>> {
    let mut selection = bitvec![0; rows.len()];
    for (i, row) in rows.iter().enumerate() {
        if matches(predicate, row)? {
            selection.set(i, true);
        }
    }

    Ok(rows
        .into_iter()
        .zip(selection.iter().by_vals())
        .filter_map(|(row, keep)| keep.then_some(row))
        .collect())
}

/// Partitions rows by the stringified values of the group-by columns. Groups
/// come out in order of first appearance. Without group-by columns the whole
/// input is one group, even when it is empty.
fn group(rows: Vec<Row>, keys: &[usize]) -> Vec<Vec<Row>> {
    if keys.is_empty() {
        return vec![rows];
    }

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<Row>> = Vec::new();
    for row in rows {
        let key = keys
            .iter()
            .map(|&pos| row[pos].to_string())
            .collect::<Vec<_>>()
            .join("\u{1f}");
        match index.entry(key) {
            Entry::Occupied(entry) => groups[*entry.get()].push(row),
            Entry::Vacant(entry) => {
                entry.insert(groups.len());
                groups.push(vec![row]);
            }
        }
    }
    groups
}

fn candidate(query: &ParsedQuery<'_>, frame: Frame<'_>) -> Result<Candidate> {
    let values = query
        .projections
        .iter()
        .map(|projection| eval(&projection.expr, frame))
        .collect::<Result<Vec<_>>>()?;

    let keys = query
        .order_by
        .iter()
        .map(|key| match &key.key {
            SortKey::Output(index) => Ok(values[*index].clone()),
            SortKey::Expr(expr) => eval(expr, frame),
        })
        .collect::<Result<Vec<_>>>()?;

    let row = query
        .projections
        .iter()
        .map(|projection| projection.output_name.as_str())
        .zip(values)
        .collect();

    Ok(Candidate { row, keys })
}

/// Stable multi-key sort. Each key compares with [Value::sort_cmp]; the
/// next key only breaks ties of the previous ones.
fn sort(candidates: &mut [Candidate], query: &ParsedQuery<'_>) {
    candidates.sort_by(|a, b| {
        for ((left, right), key) in a.keys.iter().zip(&b.keys).zip(&query.order_by) {
            let mut ord = left.sort_cmp(right);

            if key.direction == SortDirection::Desc {
                ord = ord.reverse();
            }
            // if it's not equal no need to compare more
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

fn eval(expr: &ScalarExpr, frame: Frame<'_>) -> Result<Value> {
    match expr {
        ScalarExpr::Column(pos) => Ok(match frame {
            Frame::Row(row) => row[*pos].clone(),
            // grouped queries only read group-by columns, equal across the group
            Frame::Group(rows) => rows
                .first()
                .map(|row| row[*pos].clone())
                .unwrap_or(Value::Null),
        }),
        ScalarExpr::Literal(value) => Ok(value.clone()),
        ScalarExpr::Aggregate { func, arg } => {
            let rows = match frame {
                Frame::Row(row) => slice::from_ref(row),
                Frame::Group(rows) => rows,
            };
            let mut acc = Accumulator::new(*func);
            for row in rows {
                match arg {
                    None => acc.count_row(),
                    Some(arg) => acc.update(eval(arg, Frame::Row(row))?)?,
                }
            }
            Ok(acc.finish())
        }
        ScalarExpr::Binary { left, op, right } => {
            arithmetic(*op, eval(left, frame)?, eval(right, frame)?)
        }
        ScalarExpr::Negate(inner) => negate(eval(inner, frame)?),
    }
}

/// Evaluates a WHERE condition against a single row.
///
/// Comparisons involving NULL are false; `NOT` simply inverts, so NULL rows
/// pass a negated comparison. AND and OR short-circuit.
fn matches(predicate: &Predicate, row: &Row) -> Result<bool> {
    let frame = Frame::Row(row);
    match predicate {
        Predicate::Compare { left, op, right } => {
            compare(&eval(left, frame)?, *op, &eval(right, frame)?)
        }
        Predicate::InList {
            expr,
            values,
            negated,
        } => {
            let value = eval(expr, frame)?;
            if value.is_null() {
                return Ok(false);
            }
            let mut found = false;
            for candidate in values {
                if value.loose_eq(&eval(candidate, frame)?) {
                    found = true;
                    break;
                }
            }
            Ok(found != *negated)
        }
        Predicate::Not(inner) => Ok(!matches(inner, row)?),
        Predicate::And(left, right) => Ok(matches(left, row)? && matches(right, row)?),
        Predicate::Or(left, right) => Ok(matches(left, row)? || matches(right, row)?),
    }
}

fn compare(left: &Value, op: ComparisonOp, right: &Value) -> Result<bool> {
    Ok(match op {
        ComparisonOp::Eq => left.loose_eq(right),
        ComparisonOp::NotEq => !left.is_null() && !right.is_null() && !left.loose_eq(right),
        ComparisonOp::Gt => left.loose_cmp(right)? == Some(Ordering::Greater),
        ComparisonOp::GtEq => matches!(
            left.loose_cmp(right)?,
            Some(Ordering::Greater | Ordering::Equal)
        ),
        ComparisonOp::Lt => left.loose_cmp(right)? == Some(Ordering::Less),
        ComparisonOp::LtEq => matches!(
            left.loose_cmp(right)?,
            Some(Ordering::Less | Ordering::Equal)
        ),
    })
}

fn arithmetic(op: ArithmeticOp, left: Value, right: Value) -> Result<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    match (&left, &right) {
        (Value::Int(l), Value::Int(r)) if op != ArithmeticOp::Div => {
            let checked = match op {
                ArithmeticOp::Add => l.checked_add(*r),
                ArithmeticOp::Sub => l.checked_sub(*r),
                ArithmeticOp::Mul => l.checked_mul(*r),
                ArithmeticOp::Mod if *r == 0 => return Err(division_by_zero(op)),
                ArithmeticOp::Mod | ArithmeticOp::Div => l.checked_rem(*r),
            };
            match checked {
                Some(value) => Ok(Value::Int(value)),
                None => float_arithmetic(op, *l as f64, *r as f64),
            }
        }
        _ => match (left.as_number(), right.as_number()) {
            (Some(l), Some(r)) => float_arithmetic(op, l, r),
            _ => Err(SqlError::Type(format!(
                "Cannot apply '{op}' to {} and {}",
                left.describe(),
                right.describe()
            ))),
        },
    }
}

fn float_arithmetic(op: ArithmeticOp, l: f64, r: f64) -> Result<Value> {
    if matches!(op, ArithmeticOp::Div | ArithmeticOp::Mod) && r == 0.0 {
        return Err(division_by_zero(op));
    }
    Ok(Value::Float(match op {
        ArithmeticOp::Add => l + r,
        ArithmeticOp::Sub => l - r,
        ArithmeticOp::Mul => l * r,
        ArithmeticOp::Div => l / r,
        ArithmeticOp::Mod => l % r,
    }))
}

fn division_by_zero(op: ArithmeticOp) -> SqlError {
    SqlError::Type(format!("Division by zero in '{op}' expression"))
}

fn negate(value: Value) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Int(i) => Ok(i
            .checked_neg()
            .map(Value::Int)
            .unwrap_or(Value::Float(-(i as f64)))),
        Value::Float(f) => Ok(Value::Float(-f)),
        other => Err(SqlError::Type(format!("Cannot negate {}", other.describe()))),
    }
}
