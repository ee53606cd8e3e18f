use crate::Value;
use crate::ast::*;
use crate::error::{Result, SqlError};
use crate::tokenizer::{Token, Tokenizer};

/// Message for statements that are not queries (INSERT, DELETE, ...).
pub const ONLY_SELECT: &str = "Only SELECT statements are supported in this learning environment.";

/// Deepest nesting of parentheses, subqueries and operator chains a query may use.
pub const MAX_NESTING: usize = 128;

/// Tokenizes and parses a single `SELECT` statement.
///
/// # Example
/// ```
/// # use forest_sql::parser::parse_query;
/// let select = parse_query("SELECT name FROM forest_animals WHERE age > 3").unwrap();
/// assert!(select.where_clause.is_some());
/// ```
pub fn parse_query(sql: &str) -> Result<Select> {
    let tokens = Tokenizer::new(sql).tokenize()?;
    Parser::new(tokens).parse()
}

/// Recursive-descent parser over a token stream.
///
/// Clause boundaries are found by token type. Conditions follow standard SQL
/// precedence: NOT binds tighter than AND, which binds tighter than OR.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
    too_deep: bool,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        // the stream must end with Eof
        if tokens.last() != Some(&Token::Eof) {
            tokens.push(Token::Eof);
        }
        Self {
            tokens,
            position: 0,
            depth: 0,
            too_deep: false,
        }
    }

    pub fn parse(&mut self) -> Result<Select> {
        let select = match self.current_token() {
            Token::Select => self.parse_select()?,
            Token::With => {
                return Err(SqlError::unsupported("Common table expressions (WITH)"));
            }
            Token::Eof => {
                return Err(SqlError::Clause(
                    "The query is empty. Please enter a SQL query.".into(),
                ));
            }
            _ => {
                return Err(SqlError::Clause(ONLY_SELECT.into()));
            }
        };

        // semicolon is optional in SQL so skip it
        if matches!(self.current_token(), Token::Semicolon) {
            self.advance();
        }

        if !self.is_at_end() {
            return Err(match self.current_token() {
                Token::Select => {
                    SqlError::Clause("Only one statement can be executed at a time".into())
                }
                token => SqlError::Clause(format!(
                    "Unexpected {} after the end of the query",
                    found(token)
                )),
            });
        }

        Ok(select)
    }

    // --- helpers ---

    fn current_token(&self) -> &Token {
        &self.tokens[self.position]
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            self.too_deep = true;
            return Err(SqlError::Expression("query nesting is too deep".into()));
        }
        Ok(())
    }

    /// Runs `f` one nesting level deeper.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.enter()?;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn peek(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.position + offset)
            .unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_token(), Token::Eof)
    }

    /// Consumes the token if it matches and reports whether it did.
    fn eat(&mut self, expected: &Token) -> bool {
        if self.current_token() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consumes a token that is part of the statement's clause structure.
    fn consume(&mut self, expected: Token) -> Result<()> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(SqlError::Clause(format!(
                "Expected {expected}, found {}",
                found(self.current_token())
            )))
        }
    }

    /// Consumes a token inside an expression.
    fn consume_in_expression(&mut self, expected: Token) -> Result<()> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(SqlError::Expression(format!(
                "Expected '{expected}', found {}",
                found(self.current_token())
            )))
        }
    }

    // --- statement structure ---

    fn parse_select(&mut self) -> Result<Select> {
        self.consume(Token::Select)?;
        let distinct = self.eat(&Token::Distinct);
        let projections = self.parse_select_list()?;

        if !self.eat(&Token::From) {
            return Err(match self.current_token() {
                Token::Eof | Token::RightParen | Token::Semicolon => {
                    SqlError::Clause("The SELECT query is missing a FROM clause".into())
                }
                token => SqlError::Expression(format!(
                    "Unexpected {} in the SELECT list",
                    found(token)
                )),
            });
        }

        let from = self.parse_table_ref("FROM")?;
        let joins = self.parse_joins()?;

        let where_clause = if self.eat(&Token::Where) {
            Some(self.parse_condition()?)
        } else {
            None
        };

        let group_by = if self.eat(&Token::Group) {
            self.consume(Token::By)?;
            self.parse_group_by()?
        } else {
            Vec::new()
        };

        if matches!(self.current_token(), Token::Having) {
            return Err(SqlError::unsupported("The HAVING clause"));
        }

        let order_by = if self.eat(&Token::Order) {
            self.consume(Token::By)?;
            self.parse_order_by()?
        } else {
            Vec::new()
        };

        let mut limit = None;
        let mut offset = None;
        if self.eat(&Token::Limit) {
            limit = Some(self.parse_limit_value("LIMIT")?);
            if self.eat(&Token::Offset) {
                offset = Some(self.parse_limit_value("OFFSET")?);
            }
        }

        if matches!(
            self.current_token(),
            Token::Union | Token::Intersect | Token::Except
        ) {
            return Err(SqlError::unsupported(
                "Set operations (UNION, INTERSECT, EXCEPT)",
            ));
        }

        Ok(Select {
            distinct,
            projections,
            from,
            joins,
            where_clause,
            group_by,
            order_by,
            limit,
            offset,
        })
    }

    fn parse_select_list(&mut self) -> Result<Vec<SelectItem>> {
        if matches!(self.current_token(), Token::From | Token::Eof) {
            return Err(SqlError::Expression(
                "The SELECT list is empty; name at least one column or use *".into(),
            ));
        }

        let mut items = Vec::new();
        loop {
            items.push(self.parse_select_item()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(items)
    }

    fn parse_select_item(&mut self) -> Result<SelectItem> {
        if self.eat(&Token::Star) {
            return Ok(SelectItem::Wildcard);
        }

        if let (Token::Ident(qualifier), Token::Dot, Token::Star) =
            (self.peek(0), self.peek(1), self.peek(2))
        {
            let qualifier = qualifier.clone();
            self.advance();
            self.advance();
            self.advance();
            return Ok(SelectItem::QualifiedWildcard(qualifier));
        }

        let expr = self.parse_expr()?;
        let alias = self.parse_column_alias()?;
        Ok(SelectItem::Expr { expr, alias })
    }

    /// `AS alias`, `AS 'Quoted Alias'` or a bare identifier alias.
    fn parse_column_alias(&mut self) -> Result<Option<String>> {
        if self.eat(&Token::As) {
            return match self.current_token().clone() {
                Token::Ident(alias) | Token::String(alias) => {
                    self.advance();
                    Ok(Some(alias))
                }
                token => Err(SqlError::Expression(format!(
                    "Expected an alias after AS, found {}",
                    found(&token)
                ))),
            };
        }
        if let Token::Ident(alias) = self.current_token().clone() {
            self.advance();
            return Ok(Some(alias));
        }
        Ok(None)
    }

    fn parse_table_alias(&mut self) -> Result<Option<String>> {
        if self.eat(&Token::As) {
            return match self.current_token().clone() {
                Token::Ident(alias) => {
                    self.advance();
                    Ok(Some(alias))
                }
                token => Err(SqlError::Clause(format!(
                    "Expected a table alias after AS, found {}",
                    found(&token)
                ))),
            };
        }
        if let Token::Ident(alias) = self.current_token().clone() {
            self.advance();
            return Ok(Some(alias));
        }
        Ok(None)
    }

    fn parse_table_ref(&mut self, clause: &str) -> Result<TableRef> {
        match self.current_token().clone() {
            Token::Ident(name) => {
                self.advance();
                let alias = self.parse_table_alias()?;
                Ok(TableRef::Named { name, alias })
            }
            Token::LeftParen if matches!(self.peek(1), Token::Select) => {
                self.advance();
                let subquery = self.nested(Self::parse_select)?;
                self.consume(Token::RightParen)?;
                let alias = self.parse_table_alias()?.ok_or_else(|| {
                    SqlError::Clause(
                        "A subquery in FROM needs an alias, e.g. (SELECT ...) AS t".into(),
                    )
                })?;
                Ok(TableRef::Derived {
                    subquery: Box::new(subquery),
                    alias,
                })
            }
            token => Err(SqlError::Clause(format!(
                "Expected a table name after {clause}, found {}",
                found(&token)
            ))),
        }
    }

    fn parse_joins(&mut self) -> Result<Vec<Join>> {
        let mut joins = Vec::new();
        loop {
            match self.current_token() {
                Token::Join => self.advance(),
                Token::Inner => {
                    self.advance();
                    self.consume(Token::Join)?;
                }
                Token::Left | Token::Right | Token::Full => {
                    return Err(SqlError::unsupported(format!(
                        "{} JOIN (outer joins)",
                        self.current_token()
                    )));
                }
                Token::Cross => return Err(SqlError::unsupported("CROSS JOIN")),
                Token::Comma => {
                    return Err(SqlError::unsupported(
                        "Listing several tables in FROM (implicit cross join)",
                    ));
                }
                _ => break,
            }

            let table = self.parse_table_ref("JOIN")?;
            if !self.eat(&Token::On) {
                return Err(SqlError::Clause("JOIN is missing its ON condition".into()));
            }
            let (left, right) = self.parse_join_condition()?;
            joins.push(Join { table, left, right });
        }
        Ok(joins)
    }

    fn parse_join_condition(&mut self) -> Result<(ColumnRef, ColumnRef)> {
        if matches!(self.current_token(), Token::LeftParen) {
            self.advance();
            let condition = self.nested(Self::parse_join_condition)?;
            self.consume_in_expression(Token::RightParen)?;
            return Ok(condition);
        }

        let left = self.parse_expr()?;
        match self.current_token() {
            Token::Equal => self.advance(),
            Token::NotEqual
            | Token::Greater
            | Token::GreaterEqual
            | Token::Lower
            | Token::LowerEqual => {
                return Err(SqlError::unsupported("A JOIN condition other than equality"));
            }
            token => {
                return Err(SqlError::Expression(format!(
                    "Expected '=' in the JOIN condition, found {}",
                    found(token)
                )));
            }
        }
        let right = self.parse_expr()?;

        if matches!(self.current_token(), Token::And | Token::Or) {
            return Err(SqlError::unsupported(
                "Combining several JOIN conditions with AND/OR",
            ));
        }

        match (left, right) {
            (Expr::Column(left), Expr::Column(right)) => Ok((left, right)),
            (left, right) => Err(SqlError::Expression(format!(
                "A JOIN condition must compare two columns, found {left} = {right}"
            ))),
        }
    }

    fn parse_group_by(&mut self) -> Result<Vec<ColumnRef>> {
        let mut columns = Vec::new();
        loop {
            match self.parse_expr()? {
                Expr::Column(column) => columns.push(column),
                other => {
                    return Err(SqlError::unsupported(format!(
                        "Grouping by the expression '{other}' (GROUP BY accepts column names)"
                    )));
                }
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(columns)
    }

    fn parse_order_by(&mut self) -> Result<Vec<OrderByClause>> {
        let mut clauses = Vec::new();
        loop {
            let expr = self.parse_expr()?;
            let direction = if self.eat(&Token::Desc) {
                SortDirection::Desc
            } else {
                self.eat(&Token::Asc);
                SortDirection::Asc
            };
            clauses.push(OrderByClause { expr, direction });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(clauses)
    }

    fn parse_limit_value(&mut self, clause: &str) -> Result<usize> {
        let negative = self.eat(&Token::Minus);
        match self.current_token().clone() {
            Token::Number(n) if !negative => {
                self.advance();
                usize::try_from(n).map_err(|_| {
                    SqlError::Limit(format!("{clause} must be a non-negative integer, found {n}"))
                })
            }
            Token::Number(n) => Err(SqlError::Limit(format!(
                "{clause} must be a non-negative integer, found -{n}"
            ))),
            Token::FloatNumber(f) if !negative && f.fract() == 0.0 => Err(SqlError::Limit(
                format!("{clause} value is too large, found {f}"),
            )),
            token => Err(SqlError::Limit(format!(
                "{clause} must be a non-negative integer, found {}",
                found(&token)
            ))),
        }
    }

    // --- conditions ---

    fn parse_condition(&mut self) -> Result<Condition> {
        self.parse_or()
    }

    // Operator chains build left-deep trees, so each link counts as a level.

    fn parse_or(&mut self) -> Result<Condition> {
        let base = self.depth;
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            self.enter()?;
            let right = self.parse_and()?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Condition> {
        let base = self.depth;
        let mut left = self.parse_not()?;
        while self.eat(&Token::And) {
            self.enter()?;
            let right = self.parse_not()?;
            left = Condition::And(Box::new(left), Box::new(right));
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Condition> {
        if self.eat(&Token::Not) {
            let inner = self.nested(Self::parse_not)?;
            return Ok(Condition::Not(Box::new(inner)));
        }
        self.parse_predicate()
    }

    fn parse_predicate(&mut self) -> Result<Condition> {
        // `(` may open a nested condition or an arithmetic expression; try the
        // condition first and rewind if it does not fit.
        if matches!(self.current_token(), Token::LeftParen)
            && !matches!(self.peek(1), Token::Select)
        {
            let checkpoint = (self.position, self.depth);
            self.advance();
            match self.nested(Self::parse_condition) {
                Ok(inner) => {
                    if self.eat(&Token::RightParen) && !self.continues_expression() {
                        return Ok(inner);
                    }
                }
                Err(err @ SqlError::Unsupported(_)) => return Err(err),
                Err(err) if self.too_deep => return Err(err),
                Err(_) => {}
            }
            (self.position, self.depth) = checkpoint;
        }

        let left = self.parse_expr()?;
        let op = match self.current_token() {
            Token::Equal => ComparisonOp::Eq,
            Token::NotEqual => ComparisonOp::NotEq,
            Token::Greater => ComparisonOp::Gt,
            Token::GreaterEqual => ComparisonOp::GtEq,
            Token::Lower => ComparisonOp::Lt,
            Token::LowerEqual => ComparisonOp::LtEq,
            Token::In => {
                self.advance();
                return self.parse_in(left, false);
            }
            Token::Not if matches!(self.peek(1), Token::In) => {
                self.advance();
                self.advance();
                return self.parse_in(left, true);
            }
            Token::Not if matches!(self.peek(1), Token::Like) => {
                return Err(SqlError::unsupported("LIKE pattern matching"));
            }
            Token::Not if matches!(self.peek(1), Token::Between) => {
                return Err(SqlError::unsupported("BETWEEN"));
            }
            Token::Like => return Err(SqlError::unsupported("LIKE pattern matching")),
            Token::Between => return Err(SqlError::unsupported("BETWEEN")),
            Token::Is => return Err(SqlError::unsupported("IS NULL / IS NOT NULL tests")),
            token => {
                return Err(SqlError::Expression(format!(
                    "Expected a comparison operator (=, <>, <, <=, >, >=) after '{left}', found {}",
                    found(token)
                )));
            }
        };
        self.advance();
        let right = self.parse_expr()?;
        Ok(Condition::Comparison { left, op, right })
    }

    /// True when the token after a closing parenthesis shows that the
    /// parenthesis belonged to an arithmetic or comparison expression.
    fn continues_expression(&self) -> bool {
        matches!(
            self.current_token(),
            Token::Plus
                | Token::Minus
                | Token::Star
                | Token::Slash
                | Token::Percent
                | Token::Equal
                | Token::NotEqual
                | Token::Greater
                | Token::GreaterEqual
                | Token::Lower
                | Token::LowerEqual
                | Token::In
        )
    }

    fn parse_in(&mut self, expr: Expr, negated: bool) -> Result<Condition> {
        self.consume_in_expression(Token::LeftParen)?;
        let list = if matches!(self.current_token(), Token::Select) {
            InList::Subquery(Box::new(self.nested(Self::parse_select)?))
        } else {
            let mut values = Vec::new();
            loop {
                values.push(self.parse_expr()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            InList::Values(values)
        };
        self.consume_in_expression(Token::RightParen)?;
        Ok(Condition::In {
            expr,
            list,
            negated,
        })
    }

    // --- expressions ---

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_additive()
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current_token() {
                Token::Plus => ArithmeticOp::Add,
                Token::Minus => ArithmeticOp::Sub,
                _ => break,
            };
            self.advance();
            self.enter()?;
            let right = self.parse_multiplicative()?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current_token() {
                Token::Star => ArithmeticOp::Mul,
                Token::Slash => ArithmeticOp::Div,
                Token::Percent => ArithmeticOp::Mod,
                _ => break,
            };
            self.advance();
            self.enter()?;
            let right = self.parse_unary()?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.eat(&Token::Minus) {
            let inner = self.nested(Self::parse_unary)?;
            return Ok(match inner {
                Expr::Literal(Value::Int(n)) if n != i64::MIN => Expr::Literal(Value::Int(-n)),
                Expr::Literal(Value::Float(f)) => Expr::Literal(Value::Float(-f)),
                other => Expr::Negate(Box::new(other)),
            });
        }
        if self.eat(&Token::Plus) {
            return self.nested(Self::parse_unary);
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.current_token().clone();
        match token {
            Token::Number(n) => {
                self.advance();
                Ok(Expr::Literal(Value::Int(n)))
            }
            Token::FloatNumber(f) => {
                self.advance();
                Ok(Expr::Literal(Value::Float(f)))
            }
            Token::String(s) => {
                self.advance();
                Ok(Expr::Literal(Value::from(s.as_str())))
            }
            Token::True => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(true)))
            }
            Token::False => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(false)))
            }
            Token::Null => {
                self.advance();
                Ok(Expr::Literal(Value::Null))
            }
            Token::LeftParen => {
                self.advance();
                if matches!(self.current_token(), Token::Select) {
                    let subquery = self.nested(Self::parse_select)?;
                    self.consume_in_expression(Token::RightParen)?;
                    return Ok(Expr::Subquery(Box::new(subquery)));
                }
                let inner = self.nested(Self::parse_expr)?;
                self.consume_in_expression(Token::RightParen)?;
                Ok(inner)
            }
            Token::Ident(name) => {
                self.advance();
                if matches!(self.current_token(), Token::LeftParen) {
                    return self.parse_function_call(name);
                }
                if self.eat(&Token::Dot) {
                    return match self.current_token().clone() {
                        Token::Ident(column) => {
                            self.advance();
                            Ok(Expr::Column(ColumnRef {
                                table: Some(name),
                                column,
                            }))
                        }
                        Token::Star => Err(SqlError::Expression(format!(
                            "'{name}.*' is only allowed directly in the SELECT list"
                        ))),
                        token => Err(SqlError::Expression(format!(
                            "Expected a column name after '{name}.', found {}",
                            found(&token)
                        ))),
                    };
                }
                Ok(Expr::Column(ColumnRef {
                    table: None,
                    column: name,
                }))
            }
            Token::Select => Err(SqlError::Expression(
                "A subquery must be wrapped in parentheses".into(),
            )),
            token => Err(SqlError::Expression(format!(
                "Expected an expression, found {}",
                found(&token)
            ))),
        }
    }

    fn parse_function_call(&mut self, name: String) -> Result<Expr> {
        self.consume_in_expression(Token::LeftParen)?;
        let upper = name.to_uppercase();

        let Some(func) = AggregateFn::from_name(&name) else {
            self.skip_to_closing_paren()?;
            if matches!(self.current_token(), Token::Over) {
                return Err(SqlError::unsupported("Window functions (OVER)"));
            }
            return Err(SqlError::unsupported(format!("The function {upper}()")));
        };

        if matches!(self.current_token(), Token::Distinct) {
            return Err(SqlError::unsupported(format!("{upper}(DISTINCT ...)")));
        }

        let arg = if self.eat(&Token::Star) {
            if func != AggregateFn::Count {
                return Err(SqlError::Expression(format!(
                    "{upper}(*) is not valid; only COUNT accepts *"
                )));
            }
            None
        } else {
            if matches!(self.current_token(), Token::RightParen) {
                return Err(SqlError::Expression(format!(
                    "{upper}() needs an argument"
                )));
            }
            Some(Box::new(self.nested(Self::parse_expr)?))
        };
        self.consume_in_expression(Token::RightParen)?;

        if matches!(self.current_token(), Token::Over) {
            return Err(SqlError::unsupported("Window functions (OVER)"));
        }

        Ok(Expr::Aggregate { func, arg })
    }

    /// Skips the arguments of a call whose `(` was already consumed.
    fn skip_to_closing_paren(&mut self) -> Result<()> {
        let mut depth = 1usize;
        loop {
            match self.current_token() {
                Token::LeftParen => depth += 1,
                Token::RightParen => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        return Ok(());
                    }
                }
                Token::Eof => {
                    return Err(SqlError::Expression("Unclosed parenthesis".into()));
                }
                _ => {}
            }
            self.advance();
        }
    }
}

/// Describes a token for error messages.
fn found(token: &Token) -> String {
    match token {
        Token::Eof => "end of query".to_string(),
        Token::String(s) => format!("string '{s}'"),
        other => format!("'{other}'"),
    }
}
