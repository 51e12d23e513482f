//! Assembly lexer
//!
//! Maps source text to a token stream. Statements are line-oriented,
//! so the newline is a token of its own; all other whitespace is
//! discarded. Numbers are carried as i64, deliberately wider than any
//! field they can end up in, so that range checking happens in the
//! parser rather than by silent truncation here.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LexError {
    #[error("malformed number '{0}'")]
    MalformedNumber(String),
    #[error("unknown base prefix in number '{0}' (expected 0x or 0b)")]
    UnknownBasePrefix(String),
}

/// One lexical token.
///
/// `OffsetAndBase` is never produced by the lexer itself; the parser
/// folds `Number '(' Ident ')'` into it when reading memory-reference
/// operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Ident(String),
    Number(i64),
    Delim(char),
    OffsetAndBase(i64, String),
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Characters allowed inside the digit run of a number. The base
/// letters x and b live here too (b is a hex digit anyway); which base
/// applies is decided afterwards.
fn is_number_continue(c: char) -> bool {
    c.is_ascii_hexdigit() || c == 'x'
}

/// Apply the base rule to a digit run (sign already stripped): with at
/// least three characters and a letter in position 1, `0x` selects hex
/// and `0b` binary; any other letter there is an error; otherwise the
/// run is decimal.
fn parse_digits(digits: &str) -> Result<i64, LexError> {
    let bytes = digits.as_bytes();
    if digits.len() >= 3 && bytes[1].is_ascii_alphabetic() {
        let radix = match (bytes[0], bytes[1]) {
            (b'0', b'x') => 16,
            (b'0', b'b') => 2,
            _ => return Err(LexError::UnknownBasePrefix(digits.to_owned())),
        };
        i64::from_str_radix(&digits[2..], radix)
            .map_err(|_| LexError::MalformedNumber(digits.to_owned()))
    } else {
        digits
            .parse()
            .map_err(|_| LexError::MalformedNumber(digits.to_owned()))
    }
}

/// Lex a complete source file into tokens
pub fn lex(source: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' => {
                chars.next();
            }
            '\n' => {
                chars.next();
                tokens.push(Token::Delim('\n'));
            }
            '#' => {
                // Comment runs to (not including) the newline
                while chars.peek().is_some_and(|&c| c != '\n') {
                    chars.next();
                }
            }
            c if is_ident_start(c) => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if !is_ident_continue(c) {
                        break;
                    }
                    ident.push(c);
                    chars.next();
                }
                tokens.push(Token::Ident(ident));
            }
            '+' | '-' | '0'..='9' => {
                let negative = match c {
                    '+' => {
                        chars.next();
                        false
                    }
                    '-' => {
                        chars.next();
                        true
                    }
                    _ => false,
                };
                // A bare sign not followed by a digit is a delimiter
                if !chars.peek().is_some_and(|c| c.is_ascii_digit()) {
                    tokens.push(Token::Delim(c));
                    continue;
                }
                let mut digits = String::new();
                while let Some(&c) = chars.peek() {
                    if !is_number_continue(c) {
                        break;
                    }
                    digits.push(c);
                    chars.next();
                }
                let value = parse_digits(&digits)?;
                tokens.push(Token::Number(if negative { -value } else { value }));
            }
            other => {
                chars.next();
                tokens.push(Token::Delim(other));
            }
        }
    }
    Ok(tokens)
}
