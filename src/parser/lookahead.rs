//! Pure token scans used to pick between ambiguous alternatives.
//!
//! None of these consume input or fail: they answer "does this shape start
//! here" so the parser can choose a path before committing to it.

use crate::ast::{Token, TokenKind};

/// `tokens[0]` is a `(`. True when its bracket group holds exactly one
/// top-level `,`, which makes it a range rather than a parenthesised
/// expression. The closer may be `)` or `]`.
pub fn is_range(tokens: &[Token]) -> bool {
    let mut depth = 0usize;
    let mut commas = 0usize;

    for token in tokens {
        match token.kind {
            TokenKind::Bracket => match token.text.as_str() {
                "(" | "[" | "{" => depth += 1,
                _ => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return commas == 1;
                    }
                }
            },
            TokenKind::Operator if depth == 1 && token.text == "," => commas += 1,
            TokenKind::Eof => return false,
            _ => {}
        }
    }
    false
}

/// `tokens[0]` is a `<`. Returns the index of the closing `>` when the
/// tokens read `< scalar (, scalar)* >`.
pub fn mutation_end(tokens: &[Token]) -> Option<usize> {
    if !tokens.first()?.is_operator("<") {
        return None;
    }

    let mut i = 1;
    loop {
        let value = tokens.get(i)?;
        if !value.is_scalar() || value.kind == TokenKind::Duration {
            return None;
        }
        i += 1;

        let separator = tokens.get(i)?;
        if separator.is_operator(",") {
            i += 1;
        } else if separator.is_operator(">") {
            return Some(i);
        } else {
            return None;
        }
    }
}

/// Rewrites `<a,b,c>` into the tokens of `{==a}->{==b}->{==c}`.
///
/// `span` runs from the `<` to the `>` inclusive. Generated tokens borrow the
/// position of the value they stand for, so errors still point into the
/// user's text.
pub fn expand_mutation(span: &[Token]) -> Vec<Token> {
    let mut expanded = Vec::new();

    for (i, value) in span.iter().filter(|t| t.is_scalar()).enumerate() {
        let at = value.position;
        if i > 0 {
            expanded.push(Token::new(TokenKind::Operator, "->", at));
        }
        expanded.push(Token::new(TokenKind::Bracket, "{", at));
        expanded.push(Token::new(TokenKind::Operator, "==", at));
        expanded.push(value.clone());
        expanded.push(Token::new(TokenKind::Bracket, "}", at));
    }

    expanded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    #[test]
    fn test_range_detection() {
        assert!(is_range(&tokenize("(1,5]").unwrap()));
        assert!(is_range(&tokenize("((1+0)*1,3]").unwrap()));
        assert!(!is_range(&tokenize("((2,1))").unwrap()));
        assert!(!is_range(&tokenize("(1+2)").unwrap()));
        assert!(!is_range(&tokenize("(f(1,2))").unwrap()));
    }

    #[test]
    fn test_mutation_shape() {
        assert_eq!(mutation_end(&tokenize("<0,1>").unwrap()), Some(4));
        assert_eq!(mutation_end(&tokenize("<10||>40").unwrap()), None);
        assert_eq!(mutation_end(&tokenize("<,2,'3'>").unwrap()), None);
        assert_eq!(mutation_end(&tokenize("<10").unwrap()), None);
    }

    #[test]
    fn test_expand_mutation() {
        let tokens = tokenize("<0,1>").unwrap();
        let texts: Vec<String> = expand_mutation(&tokens[..5])
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(texts, ["{", "==", "0", "}", "->", "{", "==", "1", "}"]);
    }
}
