use std::{fmt, mem};

use crate::ast::{
    ArrowStage, BinOp, Block, Bound, Call, CompareOp, Expr, Ident, Literal, Position, Program,
    Scalar, Statement, Token, TokenKind, UnaryOp,
};

mod lookahead;
mod priority;

pub use lookahead::{expand_mutation, is_range, mutation_end};
pub use priority::PriorityTable;

/// Errors raised while building the AST. Each carries the offending token.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The parser needed something else at this point
    UnexpectedToken { expected: String, found: Token },

    /// An opening bracket was never closed
    UnmatchedBracket { open: Token, found: Token },

    /// A construct that may not appear where it was written
    DisallowedNesting { message: String, token: Token },

    /// A chain element that is not a function call
    InvalidChain { message: String, token: Token },

    /// A literal that could not be represented
    InvalidLiteral { message: String, token: Token },
}

impl ParseError {
    pub fn token(&self) -> &Token {
        match self {
            ParseError::UnexpectedToken { found, .. } => found,
            ParseError::UnmatchedBracket { found, .. } => found,
            ParseError::DisallowedNesting { token, .. } => token,
            ParseError::InvalidChain { token, .. } => token,
            ParseError::InvalidLiteral { token, .. } => token,
        }
    }

    pub fn position(&self) -> Position {
        self.token().position
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnexpectedToken { expected, found } => {
                write!(f, "Expected {}, got {} at {}", expected, found, found.position)
            }
            ParseError::UnmatchedBracket { open, found } => write!(
                f,
                "Unmatched '{}' opened at {}, got {}",
                open.text, open.position, found
            ),
            ParseError::DisallowedNesting { message, token } => {
                write!(f, "{} at {}", message, token.position)
            }
            ParseError::InvalidChain { message, token } => {
                write!(f, "{} at {}", message, token.position)
            }
            ParseError::InvalidLiteral { message, token } => {
                write!(f, "{} at {}", message, token.position)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Saved cursor position for speculative parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark(usize);

pub struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    table: PriorityTable,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !tokens.last().is_some_and(Token::is_eof) {
            let end = tokens
                .last()
                .map(|t| {
                    let mut p = t.position;
                    p.offset = t.end_offset();
                    p
                })
                .unwrap_or_default();
            tokens.push(Token::eof(end));
        }
        Parser {
            tokens,
            cursor: 0,
            table: PriorityTable::default(),
        }
    }

    pub fn with_priority_table(tokens: Vec<Token>, table: PriorityTable) -> Self {
        let mut parser = Parser::new(tokens);
        parser.table = table;
        parser
    }

    fn current(&self) -> &Token {
        self.peek(0)
    }

    /// Token `n` places ahead; the trailing `Eof` repeats forever.
    fn peek(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.cursor + n).min(last)]
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if !token.is_eof() {
            self.cursor += 1;
        }
        token
    }

    pub fn mark(&self) -> Mark {
        Mark(self.cursor)
    }

    pub fn rewind(&mut self, mark: Mark) {
        self.cursor = mark.0;
    }

    /// Runs `f` speculatively: when it yields `None` the cursor is rewound to
    /// where it started.
    pub fn attempt<T>(&mut self, f: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        let mark = self.mark();
        let result = f(self);
        if result.is_none() {
            self.rewind(mark);
        }
        result
    }

    /// Installs `table` for the duration of `f`; the previous table is back
    /// in place whether `f` succeeds or fails.
    pub fn with_table<T>(
        &mut self,
        table: PriorityTable,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        let saved = mem::replace(&mut self.table, table);
        let result = f(self);
        self.table = saved;
        result
    }

    fn unexpected<T>(&self, expected: &str) -> Result<T, ParseError> {
        Err(ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: self.current().clone(),
        })
    }

    fn expect_operator(&mut self, symbol: &str) -> Result<Token, ParseError> {
        if self.current().is_operator(symbol) {
            Ok(self.advance())
        } else {
            self.unexpected(&format!("'{}'", symbol))
        }
    }

    fn expect_bracket(&mut self, symbol: &str) -> Result<Token, ParseError> {
        if self.current().is_bracket(symbol) {
            Ok(self.advance())
        } else {
            self.unexpected(&format!("'{}'", symbol))
        }
    }

    fn expect_closing(&mut self, symbol: &str, open: &Token) -> Result<Token, ParseError> {
        if self.current().is_bracket(symbol) {
            Ok(self.advance())
        } else {
            Err(ParseError::UnmatchedBracket {
                open: open.clone(),
                found: self.current().clone(),
            })
        }
    }

    fn expect_eof(&mut self) -> Result<(), ParseError> {
        if self.current().is_eof() {
            Ok(())
        } else {
            self.unexpected("end of input")
        }
    }

    fn expect_ident(&mut self) -> Result<Ident, ParseError> {
        if self.current().is_variable() {
            let token = self.advance();
            Ok(Ident {
                name: token.text.clone(),
                token,
            })
        } else {
            self.unexpected("identifier")
        }
    }

    /// Parses one expression and requires the input to end after it.
    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expression()?;
        self.expect_eof()?;
        Ok(expr)
    }

    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_level(0)
    }

    /// `E(k) := E(k+1) (op(k) E(k+1))*`, left associative.
    fn parse_level(&mut self, k: usize) -> Result<Expr, ParseError> {
        if k >= self.table.len() {
            return self.parse_unary();
        }

        let mut left = self.parse_level(k + 1)?;

        loop {
            let token = self.current();
            if token.kind != TokenKind::Operator || !self.table.contains(k, &token.text) {
                break;
            }
            let Some(op) = BinOp::from_symbol(&token.text) else {
                return self.unexpected("binary operator");
            };
            self.advance();

            let right = self.parse_level(k + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let token = self.current();
        if token.kind == TokenKind::Operator
            && let Some(op) = UnaryOp::from_symbol(&token.text)
        {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.current().clone();

        match token.kind {
            TokenKind::Bracket => match token.text.as_str() {
                "[" => self.parse_range(),
                "(" => self.parse_paren_like(),
                "{" => self.parse_arrow(),
                _ => self.unexpected("expression"),
            },
            TokenKind::Operator => {
                if token.text == "<"
                    && let Some(end) = mutation_end(&self.tokens[self.cursor..])
                {
                    self.splice_mutation(self.cursor + end);
                    return self.parse_arrow();
                }
                match CompareOp::from_symbol(&token.text) {
                    Some(op) => self.parse_compare(op),
                    None => self.unexpected("expression"),
                }
            }
            TokenKind::Variable => self.parse_callable(),
            TokenKind::Integer
            | TokenKind::Float
            | TokenKind::Str
            | TokenKind::Boolean
            | TokenKind::Duration => self.parse_scalar(),
            TokenKind::Keyword | TokenKind::Eof => self.unexpected("expression"),
        }
    }

    fn parse_scalar(&mut self) -> Result<Expr, ParseError> {
        let token = self.advance();
        let invalid = |message: &str| ParseError::InvalidLiteral {
            message: message.to_string(),
            token: token.clone(),
        };

        let value = match token.kind {
            TokenKind::Integer => Literal::Integer(
                token
                    .text
                    .parse()
                    .map_err(|_| invalid("Integer literal out of range"))?,
            ),
            TokenKind::Float => Literal::Float(
                token
                    .text
                    .parse()
                    .map_err(|_| invalid("Invalid float literal"))?,
            ),
            TokenKind::Str => Literal::Str(token.text.clone()),
            TokenKind::Boolean => Literal::Boolean(token.text == "true"),
            TokenKind::Duration => Literal::Duration(
                token
                    .duration_ms()
                    .ok_or_else(|| invalid("Duration out of range"))?,
            ),
            _ => return Err(invalid("Expected a literal")),
        };

        Ok(Expr::Scalar(Scalar { value, token }))
    }

    /// `(` opens an anonymous function, a range or a parenthesised
    /// expression, tried in that order.
    fn parse_paren_like(&mut self) -> Result<Expr, ParseError> {
        if let Some(params) = self.attempt(Self::lambda_params) {
            let body = self.with_table(PriorityTable::default(), Self::parse_expression)?;
            return Ok(Expr::Lambda {
                params,
                body: Box::new(body),
            });
        }

        if is_range(&self.tokens[self.cursor..]) {
            return self.parse_range();
        }

        let open = self.advance();
        let expr = self.parse_expression()?;
        self.expect_closing(")", &open)?;
        Ok(expr)
    }

    /// `( ident (, ident)* ) ->`, or `None` without consuming anything.
    fn lambda_params(&mut self) -> Option<Vec<Ident>> {
        if !self.current().is_bracket("(") {
            return None;
        }
        self.advance();

        let mut params = Vec::new();
        while self.current().is_variable() {
            let token = self.advance();
            params.push(Ident {
                name: token.text.clone(),
                token,
            });
            if !self.current().is_operator(",") {
                break;
            }
            self.advance();
        }

        if !self.current().is_bracket(")") {
            return None;
        }
        self.advance();
        if !self.current().is_operator("->") {
            return None;
        }
        self.advance();
        Some(params)
    }

    /// `('('|'[') Expr ',' Expr (')'|']')`; bounds use the arithmetic table.
    fn parse_range(&mut self) -> Result<Expr, ParseError> {
        let open = self.advance();
        let lower = self.with_table(PriorityTable::arithmetic(), Self::parse_expression)?;
        self.expect_operator(",")?;
        let upper = self.with_table(PriorityTable::arithmetic(), Self::parse_expression)?;

        let close = self.current().clone();
        if !(close.is_bracket(")") || close.is_bracket("]")) {
            return Err(ParseError::UnmatchedBracket { open, found: close });
        }
        self.advance();

        Ok(Expr::Range {
            lower: Bound {
                expr: Box::new(lower),
                bracket: open,
            },
            upper: Bound {
                expr: Box::new(upper),
                bracket: close,
            },
        })
    }

    fn parse_compare(&mut self, op: CompareOp) -> Result<Expr, ParseError> {
        self.advance();
        if self.current().is_eof() {
            return self.unexpected("operand after comparison");
        }
        let operand = self.with_table(PriorityTable::arithmetic(), Self::parse_expression)?;
        Ok(Expr::Compare {
            op,
            operand: Box::new(operand),
        })
    }

    /// `{ Expr } (-> { Expr })*`
    fn parse_arrow(&mut self) -> Result<Expr, ParseError> {
        let mut stages = Vec::new();

        loop {
            let open = self.expect_bracket("{")?;
            let body = self.with_table(PriorityTable::default(), Self::parse_expression)?;
            self.expect_closing("}", &open)?;
            stages.push(ArrowStage { body, token: open });

            if !self.current().is_operator("->") {
                break;
            }
            self.advance();
        }

        Ok(Expr::Arrow(stages))
    }

    /// Replaces the `<...>` span ending at `end` with its arrow expansion.
    fn splice_mutation(&mut self, end: usize) {
        let expanded = expand_mutation(&self.tokens[self.cursor..=end]);
        let mut tokens = Vec::with_capacity(self.tokens.len() + expanded.len());
        tokens.extend_from_slice(&self.tokens[..self.cursor]);
        tokens.extend(expanded);
        tokens.extend_from_slice(&self.tokens[end + 1..]);
        self.tokens = tokens;
    }

    /// A `!` glued to the name and followed by `(` marks a strict call.
    fn take_strict_marker(&mut self, name: &Token) -> bool {
        let strict = self.current().is_operator("!")
            && self.current().position.offset == name.end_offset()
            && self.peek(1).is_bracket("(");
        if strict {
            self.advance();
        }
        strict
    }

    /// Variable, call `name(args)` or chain `name(args).name(args)...`.
    fn parse_callable(&mut self) -> Result<Expr, ParseError> {
        let name = self.advance();
        let strict = self.take_strict_marker(&name);

        if !self.current().is_bracket("(") {
            return Ok(Expr::Variable(Ident {
                name: name.text.clone(),
                token: name,
            }));
        }

        let first = self.parse_call(name, strict)?;
        if !self.current().is_operator(".") {
            return Ok(Expr::Call(first));
        }

        let mut calls = vec![first];
        while self.current().is_operator(".") {
            self.advance();

            let name = self.current().clone();
            if !name.is_variable() {
                return Err(ParseError::InvalidChain {
                    message: format!("Expected a function call after '.', got {}", name),
                    token: name,
                });
            }
            self.advance();
            let strict = self.take_strict_marker(&name);

            if !self.current().is_bracket("(") {
                return Err(ParseError::InvalidChain {
                    message: format!("Chain element '{}' must be a function call", name.text),
                    token: name,
                });
            }
            calls.push(self.parse_call(name, strict)?);
        }

        Ok(Expr::Chain(calls))
    }

    fn parse_call(&mut self, name: Token, strict: bool) -> Result<Call, ParseError> {
        let open = self.expect_bracket("(")?;
        let mut args = Vec::new();

        if !self.current().is_bracket(")") {
            loop {
                args.push(self.with_table(PriorityTable::default(), Self::parse_expression)?);
                if !self.current().is_operator(",") {
                    break;
                }
                self.advance();
            }
        }
        self.expect_closing(")", &open)?;

        Ok(Call {
            name: name.text.clone(),
            strict,
            args,
            token: name,
        })
    }
}

impl Parser {
    /// Parses a whole source unit: optional preamble statements followed by
    /// the rule.
    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let statements = self.parse_statements(Token::is_eof)?;
        self.expect_eof()?;
        Ok(Program { statements })
    }

    fn parse_statements(&mut self, stop: fn(&Token) -> bool) -> Result<Vec<Statement>, ParseError> {
        let mut statements = Vec::new();

        while !stop(self.current()) && !self.current().is_eof() {
            statements.push(self.parse_statement()?);

            if !self.current().is_operator(";") {
                break;
            }
            while self.current().is_operator(";") {
                self.advance();
            }
        }
        Ok(statements)
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let token = self.current().clone();

        if token.is_keyword("let") {
            self.advance();
            let name = self.expect_ident()?;
            self.expect_operator("=")?;
            let value = self.parse_expression()?;
            return Ok(Statement::Declare { name, value });
        }
        if token.is_keyword("if") {
            return self.parse_if();
        }
        if token.is_keyword("return") {
            self.advance();
            return Ok(Statement::Return(self.parse_expression()?));
        }
        if token.is_variable() && self.peek(1).is_operator("=") {
            let name = self.expect_ident()?;
            self.advance(); // '='
            let value = self.parse_expression()?;
            return Ok(Statement::Assign { name, value });
        }
        if token.kind == TokenKind::Keyword {
            return Err(ParseError::DisallowedNesting {
                message: format!("'{}' cannot start a statement", token.text),
                token,
            });
        }

        Ok(Statement::Expr(self.parse_expression()?))
    }

    fn parse_if(&mut self) -> Result<Statement, ParseError> {
        self.advance(); // 'if'
        let open = self.expect_bracket("(")?;
        let condition = self.with_table(PriorityTable::default(), Self::parse_expression)?;
        self.expect_closing(")", &open)?;
        let then_branch = self.parse_block()?;

        let else_branch = if self.current().is_keyword("else") {
            self.advance();
            if self.current().is_keyword("if") {
                Some(Box::new(self.parse_if()?))
            } else {
                Some(Box::new(Statement::Block(self.parse_block()?)))
            }
        } else {
            None
        };

        Ok(Statement::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        let open = self.expect_bracket("{")?;
        let statements = self.parse_statements(|t| t.is_bracket("}"))?;
        self.expect_closing("}", &open)?;
        Ok(Block { statements })
    }
}
