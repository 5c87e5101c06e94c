// Copyright (c) 2025 Lacquer Maintainers
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tokenizer for the expression language.

use crate::error::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    AndAnd,
    OrOr,
    Not,
    Question,
    Colon,
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Eof,
}

/// Tokenizes `source`, skipping whitespace and using greedy longest-match
/// for two-char operators (§4.2).
pub fn tokenize(source: &str) -> Result<Vec<Token>, Error> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        match c {
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '?' => {
                tokens.push(Token::Question);
                i += 1;
            }
            ':' => {
                tokens.push(Token::Colon);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '=' if peek(&chars, i + 1) == Some('=') => {
                tokens.push(Token::EqEq);
                i += 2;
            }
            '!' if peek(&chars, i + 1) == Some('=') => {
                tokens.push(Token::NotEq);
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '<' if peek(&chars, i + 1) == Some('=') => {
                tokens.push(Token::Le);
                i += 2;
            }
            '<' => {
                tokens.push(Token::Lt);
                i += 1;
            }
            '>' if peek(&chars, i + 1) == Some('=') => {
                tokens.push(Token::Ge);
                i += 2;
            }
            '>' => {
                tokens.push(Token::Gt);
                i += 1;
            }
            '&' if peek(&chars, i + 1) == Some('&') => {
                tokens.push(Token::AndAnd);
                i += 2;
            }
            '|' if peek(&chars, i + 1) == Some('|') => {
                tokens.push(Token::OrOr);
                i += 2;
            }
            '"' | '\'' => {
                let (s, consumed) = read_string(&chars, i)?;
                tokens.push(Token::Str(s));
                i += consumed;
            }
            _ if c.is_ascii_digit() => {
                let (n, consumed) = read_number(&chars, i);
                tokens.push(Token::Number(n));
                i += consumed;
            }
            _ if c.is_alphabetic() || c == '_' => {
                let (word, consumed) = read_identifier(&chars, i);
                i += consumed;
                tokens.push(match word.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    _ => Token::Ident(word),
                });
            }
            other => {
                return Err(Error::parse(
                    format!("unexpected character '{other}'"),
                    source.to_string(),
                ))
            }
        }
    }

    tokens.push(Token::Eof);
    Ok(tokens)
}

fn peek(chars: &[char], i: usize) -> Option<char> {
    chars.get(i).copied()
}

fn read_string(chars: &[char], start: usize) -> Result<(String, usize), Error> {
    let quote = chars[start];
    let mut i = start + 1;
    let mut out = String::new();

    loop {
        match chars.get(i) {
            None => return Err(Error::parse("unterminated string literal", chars[start..].iter().collect::<String>())),
            Some(&c) if c == quote => {
                i += 1;
                break;
            }
            Some('\\') => {
                i += 1;
                match chars.get(i) {
                    Some('"') => out.push('"'),
                    Some('\'') => out.push('\''),
                    Some('\\') => out.push('\\'),
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(&other) => out.push(other),
                    None => return Err(Error::parse("unterminated escape sequence", String::new())),
                }
                i += 1;
            }
            Some(&c) => {
                out.push(c);
                i += 1;
            }
        }
    }

    Ok((out, i - start))
}

fn read_number(chars: &[char], start: usize) -> (f64, usize) {
    let mut i = start;
    while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
        i += 1;
    }
    if chars.get(i) == Some(&'.') && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit()) {
        i += 1;
        while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
            i += 1;
        }
    }
    let text: String = chars[start..i].iter().collect();
    (text.parse().unwrap_or(0.0), i - start)
}

fn read_identifier(chars: &[char], start: usize) -> (String, usize) {
    let mut i = start;
    while chars.get(i).is_some_and(|c| c.is_alphanumeric() || *c == '_') {
        i += 1;
    }
    (chars[start..i].iter().collect(), i - start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_operators() {
        let tokens = tokenize("a == b && c != d").unwrap();
        assert!(tokens.contains(&Token::EqEq));
        assert!(tokens.contains(&Token::AndAnd));
        assert!(tokens.contains(&Token::NotEq));
    }

    #[test]
    fn test_tokenize_string_escapes() {
        let tokens = tokenize(r#""a\"b""#).unwrap();
        assert_eq!(tokens[0], Token::Str("a\"b".to_string()));
    }

    #[test]
    fn test_tokenize_number() {
        let tokens = tokenize("3.14").unwrap();
        assert_eq!(tokens[0], Token::Number(3.14));
    }

    #[test]
    fn test_tokenize_keywords() {
        let tokens = tokenize("true false null").unwrap();
        assert_eq!(tokens[0], Token::True);
        assert_eq!(tokens[1], Token::False);
        assert_eq!(tokens[2], Token::Null);
    }
}
