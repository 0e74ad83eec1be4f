use std::fmt;

/// Location of a token in the rule source.
///
/// `offset` counts characters from the start of the source, `line` and
/// `column` are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Position {
            offset,
            line,
            column,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Coarse classification of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier naming a constant, a function or a chain operator
    ///
    /// # Examples
    /// ```text
    /// MAX
    /// filter
    /// positiveMeet
    /// ```
    Variable,

    /// Integer literal, possibly negative
    ///
    /// # Examples
    /// ```text
    /// 42
    /// -3
    /// ```
    Integer,

    /// Floating-point literal
    ///
    /// # Examples
    /// ```text
    /// 10.5
    /// -0.25
    /// ```
    Float,

    /// String literal in single or double quotes
    Str,

    /// `true` or `false`
    Boolean,

    /// Integer immediately followed by a time unit
    ///
    /// # Examples
    /// ```text
    /// 100ms
    /// 1s
    /// 5m
    /// ```
    Duration,

    /// Reserved word (`let`, `if`, `else`, `return` and the type names)
    Keyword,

    /// Operator or delimiter (`->`, `&&`, `==`, `,`, `.`, ...)
    Operator,

    /// One of `( ) [ ] { }`
    Bracket,

    /// End of input
    Eof,
}

/// Type names recognised as keywords.
pub const TYPE_NAMES: [&str; 4] = ["int", "float", "bool", "string"];

/// A lexical token: kind, literal text and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, position: Position) -> Self {
        Token {
            kind,
            text: text.into(),
            position,
        }
    }

    pub fn eof(position: Position) -> Self {
        Token::new(TokenKind::Eof, "", position)
    }

    /// Literal value usable as an operand: number, string, boolean or duration.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Integer
                | TokenKind::Float
                | TokenKind::Str
                | TokenKind::Boolean
                | TokenKind::Duration
        )
    }

    pub fn is_variable(&self) -> bool {
        self.kind == TokenKind::Variable
    }

    pub fn is_number(&self) -> bool {
        matches!(self.kind, TokenKind::Integer | TokenKind::Float)
    }

    pub fn is_type_name(&self) -> bool {
        self.kind == TokenKind::Keyword && TYPE_NAMES.contains(&self.text.as_str())
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == word
    }

    pub fn is_operator(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Operator && self.text == symbol
    }

    pub fn is_bracket(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Bracket && self.text == symbol
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    /// Offset of the first character after this token.
    pub fn end_offset(&self) -> usize {
        self.position.offset + self.text.chars().count()
    }

    /// Milliseconds represented by a duration token.
    pub fn duration_ms(&self) -> Option<i64> {
        if self.kind != TokenKind::Duration {
            return None;
        }
        let split = self
            .text
            .find(|c: char| c.is_ascii_alphabetic())
            .unwrap_or(self.text.len());
        let (amount, unit) = self.text.split_at(split);
        let amount: i64 = amount.parse().ok()?;
        let factor = match unit {
            "ms" => 1,
            "s" => 1_000,
            "m" => 60_000,
            "h" => 3_600_000,
            "d" => 86_400_000,
            _ => return None,
        };
        amount.checked_mul(factor)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_eof() {
            write!(f, "end of input")
        } else {
            write!(f, "'{}'", self.text)
        }
    }
}
