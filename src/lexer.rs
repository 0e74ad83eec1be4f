use std::fmt;

use crate::ast::{Position, Token, TokenKind};

/// Errors raised while scanning rule text.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub message: String,
    pub position: Position,
}

impl LexError {
    fn new(message: impl Into<String>, position: Position) -> Self {
        LexError {
            message: message.into(),
            position,
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.position)
    }
}

impl std::error::Error for LexError {}

const KEYWORDS: [&str; 8] = ["let", "if", "else", "return", "int", "float", "bool", "string"];

/// Two-character operators, checked before single characters.
const DOUBLE_OPERATORS: [&str; 11] = [
    "->", "++", "--", "==", "!=", ">=", "<=", "<<", ">>", "&&", "||",
];

const SINGLE_OPERATORS: &str = "><!=+-*/&|^,.;";

const DURATION_UNITS: [&str; 5] = ["ms", "s", "m", "h", "d"];

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn here(&self) -> Position {
        Position::new(self.position, self.line, self.column)
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.position += 1;
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn starts_with(&self, text: &str) -> bool {
        text.chars()
            .enumerate()
            .all(|(i, c)| self.peek_char(i) == Some(c))
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn read_string(&mut self, quote: char) -> Result<String, LexError> {
        let start = self.here();
        let mut result = String::new();
        self.advance(); // opening quote

        while let Some(ch) = self.current_char() {
            match ch {
                c if c == quote => {
                    self.advance();
                    return Ok(result);
                }
                '\\' => {
                    self.advance();
                    match self.current_char() {
                        Some('n') => result.push('\n'),
                        Some('t') => result.push('\t'),
                        Some('r') => result.push('\r'),
                        Some('"') => result.push('"'),
                        Some('\'') => result.push('\''),
                        Some('\\') => result.push('\\'),
                        Some(ch) => {
                            return Err(LexError::new(
                                format!("Invalid escape sequence '\\{}'", ch),
                                self.here(),
                            ));
                        }
                        None => break,
                    }
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err(LexError::new("Unterminated string literal", start))
    }

    /// Reads a number, folding a leading `-` when present, and a time unit
    /// directly attached to an integer.
    fn read_number(&mut self) -> Token {
        let start = self.here();
        let mut number = String::new();
        let mut is_float = false;

        if self.current_char() == Some('-') {
            number.push('-');
            self.advance();
        }

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else if ch == '.' && !is_float && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
            {
                is_float = true;
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if is_float {
            return Token::new(TokenKind::Float, number, start);
        }

        if let Some(unit) = self.duration_unit() {
            for _ in 0..unit.len() {
                self.advance();
            }
            number.push_str(unit);
            return Token::new(TokenKind::Duration, number, start);
        }

        Token::new(TokenKind::Integer, number, start)
    }

    fn duration_unit(&self) -> Option<&'static str> {
        DURATION_UNITS.into_iter().find(|unit| {
            self.starts_with(unit)
                && !self
                    .peek_char(unit.len())
                    .is_some_and(|c| c.is_alphanumeric() || c == '_')
        })
    }

    /// A `-` starts a negative literal when no operand precedes it.
    fn minus_starts_literal(&self) -> bool {
        if !self.peek_char(1).is_some_and(|c| c.is_ascii_digit()) {
            return false;
        }
        match self.tokens.last() {
            None => true,
            Some(prev) => match prev.kind {
                TokenKind::Operator => prev.text != ".",
                TokenKind::Bracket => matches!(prev.text.as_str(), "(" | "[" | "{"),
                TokenKind::Keyword => true,
                _ => false,
            },
        }
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();
        let start = self.here();

        let token = match self.current_char() {
            None => Token::eof(start),
            Some('-') if self.minus_starts_literal() => self.read_number(),
            Some(ch) if ch.is_ascii_digit() => self.read_number(),
            Some(ch @ ('"' | '\'')) => {
                let text = self.read_string(ch)?;
                Token::new(TokenKind::Str, text, start)
            }
            Some(ch @ ('(' | ')' | '[' | ']' | '{' | '}')) => {
                self.advance();
                Token::new(TokenKind::Bracket, ch.to_string(), start)
            }
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                let ident = self.read_identifier();
                match ident.as_str() {
                    "true" | "false" => Token::new(TokenKind::Boolean, ident, start),
                    word if KEYWORDS.contains(&word) => Token::new(TokenKind::Keyword, ident, start),
                    _ => Token::new(TokenKind::Variable, ident, start),
                }
            }
            Some(ch) => {
                if let Some(op) = DOUBLE_OPERATORS.into_iter().find(|op| self.starts_with(op)) {
                    self.advance();
                    self.advance();
                    Token::new(TokenKind::Operator, op, start)
                } else if SINGLE_OPERATORS.contains(ch) {
                    self.advance();
                    Token::new(TokenKind::Operator, ch.to_string(), start)
                } else {
                    return Err(LexError::new(
                        format!("Unexpected character '{}'", ch),
                        start,
                    ));
                }
            }
        };

        self.tokens.push(token.clone());
        Ok(token)
    }

    /// Scans the whole input. The returned list always ends with an `Eof` token.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        loop {
            let token = self.next_token()?;
            if token.is_eof() {
                return Ok(self.tokens);
            }
        }
    }
}

/// Convenience wrapper around [`Lexer::tokenize`].
pub fn tokenize(text: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(text).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_negative_literal_after_operator() {
        let tokens = tokenize("<-10").unwrap();
        assert_eq!(tokens[0].text, "<");
        assert_eq!(tokens[1].kind, TokenKind::Integer);
        assert_eq!(tokens[1].text, "-10");
    }

    #[test]
    fn test_minus_after_operand_is_binary() {
        let tokens = tokenize("1-10").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::Operator);
        assert_eq!(tokens[1].text, "-");
        assert_eq!(tokens[2].text, "10");
    }

    #[test]
    fn test_duration_units() {
        assert_eq!(
            kinds("100ms 2s 5m"),
            vec![
                TokenKind::Duration,
                TokenKind::Duration,
                TokenKind::Duration,
                TokenKind::Eof
            ]
        );
        let tokens = tokenize("2s").unwrap();
        assert_eq!(tokens[0].duration_ms(), Some(2000));
    }

    #[test]
    fn test_arrow_operator() {
        let tokens = tokenize("{==0}->{==1}").unwrap();
        assert!(tokens[4].is_operator("->"));
    }
}
