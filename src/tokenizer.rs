use std::fmt;

use crate::error::{Result, SqlError};

/// Represents the smallest meaningful units (atoms) of the SQL language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // --- SQL Keywords ---
    Select,
    Distinct,
    From,
    Where,
    And,
    Or,
    Not,
    In,
    Join,
    Inner,
    Left,
    Right,
    Full,
    Outer,
    Cross,
    On,
    As,
    Group,
    Having,
    Order,
    By,
    Asc,
    Desc,
    Limit,
    Offset,
    Is,
    Like,
    Between,
    Union,
    Intersect,
    Except,
    With,
    Over,

    // --- Identifiers & Literals ---
    /// A name representing a table, alias, column or function (e.g., `users`, `count`).
    /// Double-quoted and backquoted identifiers land here with their quotes removed.
    Ident(String),
    /// A 64-bit integer literal (e.g., `42`).
    Number(i64),
    /// A string literal, defined between single quotes (e.g., `'Alice'`).
    String(String),
    /// A 64-bit floating-point literal (e.g., `3.14`).
    FloatNumber(f64),
    /// The boolean literal `TRUE`.
    True,
    /// The boolean literal `FALSE`.
    False,
    /// The `NULL` literal.
    Null,

    // --- Symbols ---
    /// Left parenthesis `(`
    LeftParen,
    /// Right parenthesis `)`
    RightParen,
    /// Comma `,`
    Comma,
    /// Dot `.` separating a qualifier from a column
    Dot,
    /// Semicolon `;`
    Semicolon,
    /// Multiplication or wildcard symbol `*`
    Star,
    Plus,
    Minus,
    Slash,
    Percent,
    /// Greater than
    Greater,
    GreaterEqual,
    /// Lower than
    Lower,
    LowerEqual,
    /// Equal to
    Equal,
    /// `<>` or `!=`
    NotEqual,

    // --- Special ---
    /// Represents the End Of File/Input.
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Ident(name) => return f.write_str(name),
            Token::Number(n) => return write!(f, "{n}"),
            Token::FloatNumber(n) => return write!(f, "{n}"),
            Token::String(s) => return write!(f, "'{s}'"),
            Token::Select => "SELECT",
            Token::Distinct => "DISTINCT",
            Token::From => "FROM",
            Token::Where => "WHERE",
            Token::And => "AND",
            Token::Or => "OR",
            Token::Not => "NOT",
            Token::In => "IN",
            Token::Join => "JOIN",
            Token::Inner => "INNER",
            Token::Left => "LEFT",
            Token::Right => "RIGHT",
            Token::Full => "FULL",
            Token::Outer => "OUTER",
            Token::Cross => "CROSS",
            Token::On => "ON",
            Token::As => "AS",
            Token::Group => "GROUP",
            Token::Having => "HAVING",
            Token::Order => "ORDER",
            Token::By => "BY",
            Token::Asc => "ASC",
            Token::Desc => "DESC",
            Token::Limit => "LIMIT",
            Token::Offset => "OFFSET",
            Token::Is => "IS",
            Token::Like => "LIKE",
            Token::Between => "BETWEEN",
            Token::Union => "UNION",
            Token::Intersect => "INTERSECT",
            Token::Except => "EXCEPT",
            Token::With => "WITH",
            Token::Over => "OVER",
            Token::True => "TRUE",
            Token::False => "FALSE",
            Token::Null => "NULL",
            Token::LeftParen => "(",
            Token::RightParen => ")",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::Semicolon => ";",
            Token::Star => "*",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Greater => ">",
            Token::GreaterEqual => ">=",
            Token::Lower => "<",
            Token::LowerEqual => "<=",
            Token::Equal => "=",
            Token::NotEqual => "<>",
            Token::Eof => "end of query",
        };
        f.write_str(text)
    }
}

/// A lexical scanner (lexer) that converts a raw SQL string into a sequence of [Token]s.
///
/// Clause keywords are recognized here, by token, so a keyword spelled inside a
/// string literal or as part of a longer identifier (`selection`, `fromage`)
/// never starts a clause.
pub struct Tokenizer {
    /// The input string stored as a vector of characters for easy iteration.
    input: Vec<char>,
    /// The current position in the character vector.
    position: usize,
}

impl Tokenizer {
    /// Creates a new Tokenizer for the given input string.
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// Processes the entire input and returns a vector of tokens.
    ///
    /// # Errors
    /// Returns an [SqlError::Expression] if an invalid character is encountered
    /// or if a literal (like a string) is malformed.
    ///
    /// # Example
    /// ```
    /// # use forest_sql::tokenizer::{Tokenizer, Token};
    /// let mut t = Tokenizer::new("SELECT *");
    /// let tokens = t.tokenize().unwrap();
    /// assert_eq!(tokens[0], Token::Select);
    /// ```
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace_and_comments();

            if self.is_at_end() {
                break;
            }

            let token = self.next_token()?;
            tokens.push(token);
        }

        tokens.push(Token::Eof);
        Ok(tokens)
    }

    /// Identifies the next token based on the character at the current position.
    fn next_token(&mut self) -> Result<Token> {
        let ch = self.current_char();

        match ch {
            '(' => self.single(Token::LeftParen),
            ')' => self.single(Token::RightParen),
            ',' => self.single(Token::Comma),
            ';' => self.single(Token::Semicolon),
            '*' => self.single(Token::Star),
            '+' => self.single(Token::Plus),
            '-' => self.single(Token::Minus),
            '/' => self.single(Token::Slash),
            '%' => self.single(Token::Percent),
            '=' => {
                self.advance();
                // tolerate `==`
                if self.peek_char() == Some('=') {
                    self.advance();
                }
                Ok(Token::Equal)
            }
            '>' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    return Ok(Token::GreaterEqual);
                }
                Ok(Token::Greater)
            }
            '<' => {
                self.advance();
                match self.peek_char() {
                    Some('=') => {
                        self.advance();
                        Ok(Token::LowerEqual)
                    }
                    Some('>') => {
                        self.advance();
                        Ok(Token::NotEqual)
                    }
                    _ => Ok(Token::Lower),
                }
            }
            '!' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    return Ok(Token::NotEqual);
                }
                Err(SqlError::Expression(
                    "character '!' is only supported as part of '!='".into(),
                ))
            }
            '.' => {
                if self.char_at(self.position + 1).is_some_and(|c| c.is_ascii_digit()) {
                    return self.read_number();
                }
                self.single(Token::Dot)
            }
            '\'' => self.read_string(),
            '"' | '`' => self.read_quoted_identifier(ch),
            c if c.is_alphabetic() || c == '_' => self.read_identifier(),
            c if c.is_ascii_digit() => self.read_number(),
            _ => Err(SqlError::Expression(format!(
                "character {ch:?} is not supported"
            ))),
        }
    }

    // --- Navigation Helpers ---

    /// Returns the character at the current position.
    fn current_char(&self) -> char {
        self.input[self.position]
    }

    fn char_at(&self, index: usize) -> Option<char> {
        self.input.get(index).copied()
    }

    /// Returns the character at the current position, if any.
    fn peek_char(&self) -> Option<char> {
        self.char_at(self.position)
    }

    /// Moves the cursor forward by one character.
    fn advance(&mut self) {
        self.position += 1;
    }

    fn single(&mut self, token: Token) -> Result<Token> {
        self.advance();
        Ok(token)
    }

    /// Checks if the cursor has reached the end of the input.
    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    /// Consumes whitespace and `--` line comments.
    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while !self.is_at_end() && self.current_char().is_whitespace() {
                self.advance();
            }
            if self.peek_char() == Some('-') && self.char_at(self.position + 1) == Some('-') {
                while !self.is_at_end() && self.current_char() != '\n' {
                    self.advance();
                }
                continue;
            }
            break;
        }
    }

    // --- Extraction Logic ---

    /// Reads a sequence of alphanumeric characters and determines if it's
    /// a reserved SQL keyword or a user-defined identifier.
    ///
    /// Keywords are matched case-insensitively; identifiers keep their spelling.
    fn read_identifier(&mut self) -> Result<Token> {
        let mut ident = String::new();

        while !self.is_at_end()
            && (self.current_char().is_alphanumeric() || self.current_char() == '_')
        {
            ident.push(self.current_char());
            self.advance();
        }

        let token = match ident.to_uppercase().as_str() {
            "SELECT" => Token::Select,
            "DISTINCT" => Token::Distinct,
            "FROM" => Token::From,
            "WHERE" => Token::Where,
            "AND" => Token::And,
            "OR" => Token::Or,
            "NOT" => Token::Not,
            "IN" => Token::In,
            "JOIN" => Token::Join,
            "INNER" => Token::Inner,
            "LEFT" => Token::Left,
            "RIGHT" => Token::Right,
            "FULL" => Token::Full,
            "OUTER" => Token::Outer,
            "CROSS" => Token::Cross,
            "ON" => Token::On,
            "AS" => Token::As,
            "GROUP" => Token::Group,
            "HAVING" => Token::Having,
            "ORDER" => Token::Order,
            "BY" => Token::By,
            "ASC" => Token::Asc,
            "DESC" => Token::Desc,
            "LIMIT" => Token::Limit,
            "OFFSET" => Token::Offset,
            "IS" => Token::Is,
            "LIKE" => Token::Like,
            "BETWEEN" => Token::Between,
            "UNION" => Token::Union,
            "INTERSECT" => Token::Intersect,
            "EXCEPT" => Token::Except,
            "WITH" => Token::With,
            "OVER" => Token::Over,
            "TRUE" => Token::True,
            "FALSE" => Token::False,
            "NULL" => Token::Null,
            _ => Token::Ident(ident),
        };
        Ok(token)
    }

    /// Reads a numeric literal. If a dot `.` is encountered, it returns a
    /// [Token::FloatNumber], otherwise a [Token::Number].
    fn read_number(&mut self) -> Result<Token> {
        let mut number = String::new();
        let mut has_dot = false;

        while !self.is_at_end()
            && (self.current_char().is_ascii_digit() || (self.current_char() == '.' && !has_dot))
        {
            if self.current_char() == '.' {
                has_dot = true;
            }
            number.push(self.current_char());
            self.advance();
        }

        if !self.is_at_end() && self.current_char() == '.' {
            return Err(SqlError::Expression(format!(
                "malformed number '{number}.': multiple dots are not allowed"
            )));
        }
        if !self.is_at_end() && self.current_char().is_alphabetic() {
            return Err(SqlError::Expression(format!(
                "malformed number starting at '{number}{}'",
                self.current_char()
            )));
        }

        if has_dot {
            return number
                .parse::<f64>()
                .map(Token::FloatNumber)
                .map_err(|e| SqlError::Expression(format!("invalid number '{number}': {e}")));
        }

        // integers past i64 are kept as floats
        match number.parse::<i64>() {
            Ok(n) => Ok(Token::Number(n)),
            Err(_) => number
                .parse::<f64>()
                .map(Token::FloatNumber)
                .map_err(|e| SqlError::Expression(format!("invalid number '{number}': {e}"))),
        }
    }

    /// Reads a string literal enclosed in single quotes. A doubled quote
    /// (`''`) inside the literal stands for one quote character.
    fn read_string(&mut self) -> Result<Token> {
        self.advance(); // Skip the opening quote

        let mut string = String::new();
        loop {
            if self.is_at_end() {
                return Err(SqlError::Expression(format!(
                    "Unterminated string '{string}"
                )));
            }
            let ch = self.current_char();
            self.advance();
            if ch == '\'' {
                if self.peek_char() == Some('\'') {
                    string.push('\'');
                    self.advance();
                    continue;
                }
                break;
            }
            string.push(ch);
        }

        Ok(Token::String(string))
    }

    fn read_quoted_identifier(&mut self, quote: char) -> Result<Token> {
        self.advance();

        let mut ident = String::new();
        while !self.is_at_end() && self.current_char() != quote {
            ident.push(self.current_char());
            self.advance();
        }

        if self.is_at_end() {
            return Err(SqlError::Expression(format!(
                "Unterminated quoted identifier {quote}{ident}"
            )));
        }
        self.advance();

        Ok(Token::Ident(ident))
    }
}
