//! Maximal-munch scanner for Artemis source text.
//!
//! Produces a flat `Vec<Token>` terminated by `TokenKind::Eof`. Illegal
//! characters are reported to stderr and skipped rather than aborting the
//! scan, matching the prototype lexer's `error()` handler: lexing always
//! terminates, it just may report along the way.

use crate::token::{keyword_for, Token, TokenKind};

pub struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    source: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            source,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn matches(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Scan the whole source into a token stream. Never fails: illegal
    /// characters are reported and skipped (§4.1).
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let line = self.line;
            let Some(c) = self.peek() else {
                tokens.push(Token::new(TokenKind::Eof, line));
                break;
            };

            if c.is_ascii_digit() {
                tokens.push(self.scan_number());
                continue;
            }
            if c.is_alphabetic() || c == '_' {
                tokens.push(self.scan_ident());
                continue;
            }
            if c == '\'' {
                tokens.push(self.scan_string());
                continue;
            }

            self.advance();
            let kind = match c {
                '=' if self.matches('=') => TokenKind::EqEq,
                '=' => TokenKind::Assign,
                '!' if self.matches('=') => TokenKind::NotEq,
                '<' if self.matches('=') => TokenKind::LtEq,
                '<' => TokenKind::Lt,
                '>' if self.matches('=') => TokenKind::GtEq,
                '>' => TokenKind::Gt,
                '+' if self.matches('+') => TokenKind::PlusPlus,
                '+' => TokenKind::Plus,
                '-' if self.matches('-') => TokenKind::MinusMinus,
                '-' => TokenKind::Minus,
                '*' => TokenKind::Star,
                '/' => TokenKind::Slash,
                ':' => TokenKind::Colon,
                ',' => TokenKind::Comma,
                '.' => TokenKind::Dot,
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                '{' => TokenKind::LBrace,
                '}' => TokenKind::RBrace,
                '[' => TokenKind::LBracket,
                ']' => TokenKind::RBracket,
                other => {
                    eprintln!("Illegal character {other:?} at line {line}");
                    continue;
                }
            };
            tokens.push(Token::new(kind, line));
        }
        tokens
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some('\n') => {
                    self.line += 1;
                    self.pos += 1;
                }
                Some(c) if c.is_whitespace() => {
                    self.pos += 1;
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_number(&mut self) -> Token {
        let line = self.line;
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
            let text: String = self.chars[start..self.pos].iter().collect();
            return Token::new(TokenKind::Float(text.parse().unwrap_or(0.0)), line);
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        Token::new(TokenKind::Int(text.parse().unwrap_or(0)), line)
    }

    fn scan_ident(&mut self) -> Token {
        let line = self.line;
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let kind = keyword_for(&text).unwrap_or(TokenKind::Ident(text));
        Token::new(kind, line)
    }

    /// Scans a single-quoted string literal, decoding C-style escapes
    /// (`\n`, `\t`, `\\`, `\'`) as it goes.
    fn scan_string(&mut self) -> Token {
        let line = self.line;
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.advance() {
                None => {
                    eprintln!("Unterminated string literal starting at line {line}");
                    break;
                }
                Some('\'') => break,
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('\\') => value.push('\\'),
                    Some('\'') => value.push('\''),
                    Some(other) => {
                        value.push('\\');
                        value.push(other);
                    }
                    None => break,
                },
                Some(c) => value.push(c),
            }
        }
        Token::new(TokenKind::Str(value), line)
    }

    #[allow(dead_code)]
    pub fn source(&self) -> &'a str {
        self.source
    }
}

/// Convenience wrapper: scan `source` and return its token stream.
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_keywords_and_identifiers() {
        let toks = tokenize("using io int _exec");
        assert_eq!(
            toks,
            vec![
                Token::new(TokenKind::Using, 1),
                Token::new(TokenKind::Ident("io".into()), 1),
                Token::new(TokenKind::TypeInt, 1),
                Token::new(TokenKind::Ident("_exec".into()), 1),
                Token::new(TokenKind::Eof, 1),
            ]
        );
    }

    #[test]
    fn tokenizes_string_with_escapes() {
        let toks = tokenize(r"'hi\n'");
        assert_eq!(toks[0].kind, TokenKind::Str("hi\n".to_string()));
    }

    #[test]
    fn comments_never_produce_a_token() {
        let toks = tokenize("// comment only\n");
        assert_eq!(toks, vec![Token::new(TokenKind::Eof, 2)]);
    }

    #[test]
    fn tracks_line_numbers_across_newlines() {
        let toks = tokenize("int x\nint y");
        let y_tok = toks.iter().find(|t| t.kind == TokenKind::Ident("y".into())).unwrap();
        assert_eq!(y_tok.line, 2);
    }

    #[test]
    fn illegal_character_is_skipped_not_fatal() {
        let toks = tokenize("int x $ int y");
        // both `x` and `y` idents still appear; scan completes with Eof.
        assert!(toks.iter().any(|t| t.kind == TokenKind::Ident("x".into())));
        assert!(toks.iter().any(|t| t.kind == TokenKind::Ident("y".into())));
        assert_eq!(toks.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn float_and_int_literals() {
        let toks = tokenize("3.14 42");
        assert_eq!(toks[0].kind, TokenKind::Float(3.14));
        assert_eq!(toks[1].kind, TokenKind::Int(42));
    }
}
