//! Binds a parsed [Select] to the tables of a [TableSet].
//!
//! Every column reference becomes a position in the combined (joined) row, so
//! the executor never looks up a name. Uncorrelated subqueries are run once
//! here and replaced by their values.

use std::borrow::Cow;

use tracing::trace;

use crate::Value;
use crate::ast::{
    AggregateFn, ArithmeticOp, ColumnRef, ComparisonOp, Condition, Expr, InList, OrderByClause,
    Select, SelectItem, SortDirection, TableRef,
};
use crate::error::{Result, SqlError};
use crate::executor;
use crate::result::ResultRow;
use crate::table::{Table, TableSet};

/// A scalar expression over the combined row of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarExpr {
    /// Position in the combined row.
    Column(usize),
    Literal(Value),
    Aggregate {
        func: AggregateFn,
        arg: Option<Box<ScalarExpr>>,
    },
    Binary {
        left: Box<ScalarExpr>,
        op: ArithmeticOp,
        right: Box<ScalarExpr>,
    },
    Negate(Box<ScalarExpr>),
}

impl ScalarExpr {
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Self::Aggregate { .. } => true,
            Self::Binary { left, right, .. } => {
                left.contains_aggregate() || right.contains_aggregate()
            }
            Self::Negate(inner) => inner.contains_aggregate(),
            Self::Column(_) | Self::Literal(_) => false,
        }
    }

    /// First column read outside of an aggregate that is not one of `keys`.
    fn ungrouped_column(&self, keys: &[usize]) -> Option<usize> {
        match self {
            Self::Column(pos) if !keys.contains(pos) => Some(*pos),
            Self::Binary { left, right, .. } => left
                .ungrouped_column(keys)
                .or_else(|| right.ungrouped_column(keys)),
            Self::Negate(inner) => inner.ungrouped_column(keys),
            _ => None,
        }
    }
}

/// A bound WHERE condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        left: ScalarExpr,
        op: ComparisonOp,
        right: ScalarExpr,
    },
    InList {
        expr: ScalarExpr,
        values: Vec<ScalarExpr>,
        negated: bool,
    },
    Not(Box<Predicate>),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub expr: ScalarExpr,
    pub output_name: String,
    pub is_aggregate: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    /// Index into the projections (an output alias or `ORDER BY 2`).
    Output(usize),
    Expr(ScalarExpr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderKey {
    pub key: SortKey,
    pub direction: SortDirection,
}

/// One table visible to the query under its alias (or its own name).
#[derive(Debug, Clone)]
pub struct Binding<'t> {
    pub name: String,
    pub table: Cow<'t, Table>,
    /// Position of this table's first column in the combined row.
    pub offset: usize,
}

impl Binding<'_> {
    pub fn width(&self) -> usize {
        self.table.columns.len()
    }

    fn contains(&self, pos: usize) -> bool {
        (self.offset..self.offset + self.width()).contains(&pos)
    }
}

/// Equi-join of `bindings[i + 1]` onto the rows built so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinPlan {
    /// Position in the combined row of the tables already joined.
    pub left: usize,
    /// Column index inside the joined table.
    pub right: usize,
}

#[derive(Debug, Clone)]
pub struct Source<'t> {
    /// The FROM table first, then one binding per JOIN.
    pub bindings: Vec<Binding<'t>>,
    pub joins: Vec<JoinPlan>,
}

impl Source<'_> {
    /// Declared name of the column at `pos` in the combined row.
    pub fn column_name(&self, pos: usize) -> &str {
        column_name(&self.bindings, pos)
    }
}

/// A fully bound query, ready for [executor::run].
#[derive(Debug, Clone)]
pub struct ParsedQuery<'t> {
    pub distinct: bool,
    pub projections: Vec<Projection>,
    pub source: Source<'t>,
    pub where_condition: Option<Predicate>,
    pub group_by: Vec<usize>,
    /// True when rows collapse into groups: a GROUP BY or any aggregate.
    pub grouped: bool,
    pub order_by: Vec<OrderKey>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ParsedQuery<'_> {
    /// Names of the result columns in order, each listed once.
    pub fn output_columns(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::with_capacity(self.projections.len());
        for projection in &self.projections {
            if !names.contains(&projection.output_name) {
                names.push(projection.output_name.clone());
            }
        }
        names
    }
}

/// A binding of an enclosing query, kept to recognize correlated references.
#[derive(Debug, Clone)]
struct OuterBinding {
    name: String,
    columns: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Where,
    Select,
    OrderBy,
    AggregateArgument,
}

pub struct Resolver<'t> {
    tables: &'t TableSet,
    outer: Vec<OuterBinding>,
}

impl<'t> Resolver<'t> {
    pub fn new(tables: &'t TableSet) -> Self {
        Self {
            tables,
            outer: Vec::new(),
        }
    }

    /// Binds every clause of `select`.
    ///
    /// # Errors
    /// Fails on unknown tables or columns, ambiguous column names, misplaced
    /// aggregates, ungrouped columns in a grouped query, correlated subqueries
    /// and on any error raised while running an uncorrelated subquery.
    pub fn resolve(&self, select: &Select) -> Result<ParsedQuery<'t>> {
        let source = self.bind_source(select)?;
        let scope = source.bindings.as_slice();

        let where_condition = select
            .where_clause
            .as_ref()
            .map(|condition| self.bind_condition(scope, condition))
            .transpose()?;

        let group_by = select
            .group_by
            .iter()
            .map(|column| self.resolve_column(scope, column))
            .collect::<Result<Vec<_>>>()?;

        let projections = self.bind_projections(scope, &select.projections)?;

        let order_by = select
            .order_by
            .iter()
            .map(|clause| self.bind_order_key(scope, &projections, clause))
            .collect::<Result<Vec<_>>>()?;

        let grouped = !group_by.is_empty()
            || projections.iter().any(|p| p.is_aggregate)
            || order_by
                .iter()
                .any(|k| matches!(&k.key, SortKey::Expr(e) if e.contains_aggregate()));

        if grouped {
            check_grouping(&source, &group_by, &projections, &order_by)?;
        }

        trace!(
            bindings = source.bindings.len(),
            projections = projections.len(),
            grouped,
            "query bound"
        );

        Ok(ParsedQuery {
            distinct: select.distinct,
            projections,
            source,
            where_condition,
            group_by,
            grouped,
            order_by,
            limit: select.limit,
            offset: select.offset,
        })
    }

    // --- source ---

    fn bind_source(&self, select: &Select) -> Result<Source<'t>> {
        let mut bindings = vec![self.bind_table(&select.from, 0)?];
        let mut joins = Vec::with_capacity(select.joins.len());

        for join in &select.joins {
            let offset: usize = bindings.iter().map(Binding::width).sum();
            let binding = self.bind_table(&join.table, offset)?;
            if let Some(existing) = bindings
                .iter()
                .find(|b| b.name.eq_ignore_ascii_case(&binding.name))
            {
                return Err(SqlError::unsupported(format!(
                    "Using the name '{}' for two tables in one query (a self-join needs a distinct alias on each side)",
                    existing.name
                )));
            }
            let joined_name = binding.name.clone();
            bindings.push(binding);

            let left = self.resolve_column(&bindings, &join.left)?;
            let right = self.resolve_column(&bindings, &join.right)?;
            let plan = match (left >= offset, right >= offset) {
                (false, true) => JoinPlan {
                    left,
                    right: right - offset,
                },
                (true, false) => JoinPlan {
                    left: right,
                    right: left - offset,
                },
                _ => {
                    return Err(SqlError::Expression(format!(
                        "The JOIN condition {} = {} must compare a column of '{joined_name}' with a column of a table before it",
                        join.left, join.right
                    )));
                }
            };
            joins.push(plan);
        }

        Ok(Source { bindings, joins })
    }

    fn bind_table(&self, table_ref: &TableRef, offset: usize) -> Result<Binding<'t>> {
        match table_ref {
            TableRef::Named { name, alias } => {
                let table = self
                    .tables
                    .get(name)
                    .ok_or_else(|| SqlError::TableNotFound {
                        table: name.clone(),
                        available: self.tables.names(),
                    })?;
                Ok(Binding {
                    name: alias.clone().unwrap_or_else(|| table.name.clone()),
                    table: Cow::Borrowed(table),
                    offset,
                })
            }
            // a derived table cannot see the bindings next to it, only the
            // enclosing queries this resolver already knows about
            TableRef::Derived { subquery, alias } => Ok(Binding {
                name: alias.clone(),
                table: Cow::Owned(self.materialize(subquery, alias)?),
                offset,
            }),
        }
    }

    /// Runs a FROM-position subquery and stores its rows as a table.
    fn materialize(&self, subquery: &Select, alias: &str) -> Result<Table> {
        let plan = self.resolve(subquery)?;
        let columns = plan.output_columns();
        let rows = executor::run(&plan)?;
        let data = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Table::with_rows(alias, columns, data)
    }

    // --- names ---

    fn find_binding<'s>(
        &self,
        scope: &'s [Binding<'t>],
        qualifier: &str,
    ) -> Result<&'s Binding<'t>> {
        if let Some(binding) = scope
            .iter()
            .find(|b| b.name.eq_ignore_ascii_case(qualifier))
        {
            return Ok(binding);
        }

        // an aliased table may still be qualified by its own name
        let mut by_table = scope
            .iter()
            .filter(|b| b.table.name.eq_ignore_ascii_case(qualifier));
        if let (Some(binding), None) = (by_table.next(), by_table.next()) {
            return Ok(binding);
        }

        if self
            .outer
            .iter()
            .any(|b| b.name.eq_ignore_ascii_case(qualifier))
        {
            return Err(SqlError::unsupported(format!(
                "Correlated subqueries (the reference to '{qualifier}' belongs to an outer query)"
            )));
        }

        Err(SqlError::TableNotFound {
            table: qualifier.to_string(),
            available: scope.iter().map(|b| b.name.clone()).collect(),
        })
    }

    fn resolve_column(&self, scope: &[Binding<'t>], column: &ColumnRef) -> Result<usize> {
        if let Some(qualifier) = &column.table {
            let binding = self.find_binding(scope, qualifier)?;
            return binding
                .table
                .column_index(&column.column)
                .map(|index| binding.offset + index)
                .ok_or_else(|| SqlError::ColumnNotFound {
                    column: column.column.clone(),
                    table: binding.table.name.clone(),
                    available: binding.table.columns.clone(),
                });
        }

        let mut matches = scope.iter().filter_map(|binding| {
            binding
                .table
                .column_index(&column.column)
                .map(|index| (binding, binding.offset + index))
        });

        match (matches.next(), matches.next()) {
            (Some((_, pos)), None) => Ok(pos),
            (Some((first, _)), Some((second, _))) => Err(SqlError::Expression(format!(
                "Column '{name}' is ambiguous: it exists in both '{}' and '{}'. Qualify it, e.g. {}.{name}",
                first.name,
                second.name,
                first.name,
                name = column.column
            ))),
            (None, _) => {
                if self.outer.iter().any(|b| {
                    b.columns
                        .iter()
                        .any(|c| c.eq_ignore_ascii_case(&column.column))
                }) {
                    return Err(SqlError::unsupported(format!(
                        "Correlated subqueries (the column '{}' belongs to an outer query)",
                        column.column
                    )));
                }

                let mut available: Vec<String> = Vec::new();
                for binding in scope {
                    for name in &binding.table.columns {
                        if !available.contains(name) {
                            available.push(name.clone());
                        }
                    }
                }
                Err(SqlError::ColumnNotFound {
                    column: column.column.clone(),
                    table: scope
                        .iter()
                        .map(|b| b.table.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                    available,
                })
            }
        }
    }

    // --- expressions ---

    fn bind_scalar(
        &self,
        scope: &[Binding<'t>],
        expr: &Expr,
        position: Position,
    ) -> Result<ScalarExpr> {
        Ok(match expr {
            Expr::Column(column) => ScalarExpr::Column(self.resolve_column(scope, column)?),
            Expr::Literal(value) => ScalarExpr::Literal(value.clone()),
            Expr::Aggregate { func, arg } => {
                match position {
                    Position::Where => {
                        return Err(SqlError::Expression(format!(
                            "Aggregate functions such as {}() cannot be used in WHERE",
                            func.to_string().to_uppercase()
                        )));
                    }
                    Position::AggregateArgument => {
                        return Err(SqlError::Expression(format!(
                            "Aggregate functions cannot be nested: {expr}"
                        )));
                    }
                    Position::Select | Position::OrderBy => {}
                }
                let arg = arg
                    .as_ref()
                    .map(|arg| {
                        self.bind_scalar(scope, arg, Position::AggregateArgument)
                            .map(Box::new)
                    })
                    .transpose()?;
                ScalarExpr::Aggregate { func: *func, arg }
            }
            Expr::Binary { left, op, right } => ScalarExpr::Binary {
                left: Box::new(self.bind_scalar(scope, left, position)?),
                op: *op,
                right: Box::new(self.bind_scalar(scope, right, position)?),
            },
            Expr::Negate(inner) => {
                ScalarExpr::Negate(Box::new(self.bind_scalar(scope, inner, position)?))
            }
            Expr::Subquery(select) => ScalarExpr::Literal(self.scalar_subquery(scope, select)?),
        })
    }

    fn bind_condition(&self, scope: &[Binding<'t>], condition: &Condition) -> Result<Predicate> {
        Ok(match condition {
            Condition::Comparison { left, op, right } => Predicate::Compare {
                left: self.bind_scalar(scope, left, Position::Where)?,
                op: *op,
                right: self.bind_comparison_operand(scope, right)?,
            },
            Condition::In {
                expr,
                list,
                negated,
            } => {
                let values = match list {
                    InList::Values(values) => values
                        .iter()
                        .map(|value| self.bind_scalar(scope, value, Position::Where))
                        .collect::<Result<Vec<_>>>()?,
                    InList::Subquery(select) => self
                        .subquery_values(scope, select)?
                        .into_iter()
                        .map(ScalarExpr::Literal)
                        .collect(),
                };
                Predicate::InList {
                    expr: self.bind_scalar(scope, expr, Position::Where)?,
                    values,
                    negated: *negated,
                }
            }
            Condition::Not(inner) => Predicate::Not(Box::new(self.bind_condition(scope, inner)?)),
            Condition::And(left, right) => Predicate::And(
                Box::new(self.bind_condition(scope, left)?),
                Box::new(self.bind_condition(scope, right)?),
            ),
            Condition::Or(left, right) => Predicate::Or(
                Box::new(self.bind_condition(scope, left)?),
                Box::new(self.bind_condition(scope, right)?),
            ),
        })
    }

    /// Right side of a WHERE comparison. A bare identifier that names no
    /// column is read as text, so `species = Owl` still matches.
    fn bind_comparison_operand(&self, scope: &[Binding<'t>], expr: &Expr) -> Result<ScalarExpr> {
        if let Expr::Column(column @ ColumnRef { table: None, .. }) = expr {
            return match self.resolve_column(scope, column) {
                Ok(pos) => Ok(ScalarExpr::Column(pos)),
                Err(SqlError::ColumnNotFound { .. }) => {
                    Ok(ScalarExpr::Literal(Value::from(column.column.as_str())))
                }
                Err(err) => Err(err),
            };
        }
        self.bind_scalar(scope, expr, Position::Where)
    }

    fn bind_projections(
        &self,
        scope: &[Binding<'t>],
        items: &[SelectItem],
    ) -> Result<Vec<Projection>> {
        let mut projections = Vec::with_capacity(items.len());
        for item in items {
            match item {
                SelectItem::Wildcard => {
                    for binding in scope {
                        projections.extend(binding_columns(binding));
                    }
                }
                SelectItem::QualifiedWildcard(qualifier) => {
                    let binding = self.find_binding(scope, qualifier)?;
                    projections.extend(binding_columns(binding));
                }
                SelectItem::Expr { expr, alias } => {
                    let bound = self.bind_scalar(scope, expr, Position::Select)?;
                    let output_name = match (alias, &bound) {
                        (Some(alias), _) => alias.clone(),
                        (None, ScalarExpr::Column(pos)) if matches!(expr, Expr::Column(_)) => {
                            column_name(scope, *pos).to_string()
                        }
                        (None, _) if matches!(expr, Expr::Aggregate { .. }) => {
                            expr.to_string().to_lowercase()
                        }
                        (None, _) => expr.to_string(),
                    };
                    projections.push(Projection {
                        is_aggregate: bound.contains_aggregate(),
                        expr: bound,
                        output_name,
                    });
                }
            }
        }
        Ok(projections)
    }

    fn bind_order_key(
        &self,
        scope: &[Binding<'t>],
        projections: &[Projection],
        clause: &OrderByClause,
    ) -> Result<OrderKey> {
        let key = match &clause.expr {
            // ORDER BY 2
            Expr::Literal(Value::Int(n)) => {
                let index = usize::try_from(*n)
                    .ok()
                    .filter(|i| (1..=projections.len()).contains(i))
                    .ok_or_else(|| {
                        SqlError::Expression(format!(
                            "ORDER BY position {n} is out of range; the query selects {} columns",
                            projections.len()
                        ))
                    })?;
                SortKey::Output(index - 1)
            }
            Expr::Column(ColumnRef {
                table: None,
                column,
            }) => match projections
                .iter()
                .position(|p| p.output_name.eq_ignore_ascii_case(column))
            {
                Some(index) => SortKey::Output(index),
                None => SortKey::Expr(self.bind_scalar(scope, &clause.expr, Position::OrderBy)?),
            },
            expr => SortKey::Expr(self.bind_scalar(scope, expr, Position::OrderBy)?),
        };
        Ok(OrderKey {
            key,
            direction: clause.direction,
        })
    }

    // --- subqueries ---

    /// A resolver for a subquery nested inside a query with `scope`.
    fn enclosing(&self, scope: &[Binding<'t>]) -> Resolver<'t> {
        let mut outer = self.outer.clone();
        outer.extend(scope.iter().map(|binding| OuterBinding {
            name: binding.name.clone(),
            columns: binding.table.columns.clone(),
        }));
        Resolver {
            tables: self.tables,
            outer,
        }
    }

    /// Runs a subquery that must produce a single column.
    fn run_single_column(
        &self,
        scope: &[Binding<'t>],
        select: &Select,
    ) -> Result<(String, Vec<ResultRow>)> {
        let plan = self.enclosing(scope).resolve(select)?;
        let mut columns = plan.output_columns();
        if columns.len() != 1 {
            return Err(SqlError::Expression(format!(
                "A subquery used as a value must select exactly one column, found {}",
                columns.len()
            )));
        }
        let rows = executor::run(&plan)?;
        Ok((columns.remove(0), rows))
    }

    fn scalar_subquery(&self, scope: &[Binding<'t>], select: &Select) -> Result<Value> {
        let (column, rows) = self.run_single_column(scope, select)?;
        match rows.as_slice() {
            [] => Ok(Value::Null),
            [row] => Ok(row.get(&column).cloned().unwrap_or(Value::Null)),
            _ => Err(SqlError::Expression(format!(
                "A subquery used as a value returned {} rows; it must return at most one",
                rows.len()
            ))),
        }
    }

    fn subquery_values(&self, scope: &[Binding<'t>], select: &Select) -> Result<Vec<Value>> {
        let (column, rows) = self.run_single_column(scope, select)?;
        Ok(rows
            .iter()
            .map(|row| row.get(&column).cloned().unwrap_or(Value::Null))
            .collect())
    }
}

fn column_name<'a>(scope: &'a [Binding<'_>], pos: usize) -> &'a str {
    scope
        .iter()
        .find(|binding| binding.contains(pos))
        .and_then(|binding| binding.table.columns.get(pos - binding.offset))
        .map(String::as_str)
        .unwrap_or_default()
}

fn binding_columns<'a>(binding: &'a Binding<'_>) -> impl Iterator<Item = Projection> + 'a {
    binding
        .table
        .columns
        .iter()
        .enumerate()
        .map(move |(index, name)| Projection {
            expr: ScalarExpr::Column(binding.offset + index),
            output_name: name.clone(),
            is_aggregate: false,
        })
}

fn check_grouping(
    source: &Source<'_>,
    group_by: &[usize],
    projections: &[Projection],
    order_by: &[OrderKey],
) -> Result<()> {
    let sort_exprs = order_by.iter().filter_map(|key| match &key.key {
        SortKey::Expr(expr) => Some(expr),
        SortKey::Output(_) => None,
    });
    for expr in projections.iter().map(|p| &p.expr).chain(sort_exprs) {
        if let Some(pos) = expr.ungrouped_column(group_by) {
            return Err(SqlError::Expression(format!(
                "Column '{}' must appear in GROUP BY or be used inside an aggregate function",
                source.column_name(pos)
            )));
        }
    }
    Ok(())
}
