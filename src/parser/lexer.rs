//! Lexer for the description language.

use crate::parser::error::ParseError;
use crate::source::Location;
use crate::StringId;
use std::iter::Peekable;
use std::str::Chars;

/// One lexed token.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(StringId),
    /// A number keeping its raw source text alongside the value.
    Number { text: String, value: u64 },
    /// A template placeholder `$<id>`.
    Template(u32),
    /// A quoted string with `\"` and `\\` unescaped; other escape
    /// sequences pass through verbatim for the target language.
    Str(String),
    LBracket,
    RBracket,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Eq,
    Newline,
    Eof,
}

impl TokenKind {
    /// Short human-readable description for error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("\"{}\"", name),
            TokenKind::Number { text, .. } => format!("number {}", text),
            TokenKind::Template(id) => format!("${}", id),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::LBracket => "\"[\"".to_string(),
            TokenKind::RBracket => "\"]\"".to_string(),
            TokenKind::LParen => "\"(\"".to_string(),
            TokenKind::RParen => "\")\"".to_string(),
            TokenKind::LBrace => "\"{\"".to_string(),
            TokenKind::RBrace => "\"}\"".to_string(),
            TokenKind::Comma => "\",\"".to_string(),
            TokenKind::Colon => "\":\"".to_string(),
            TokenKind::Eq => "\"=\"".to_string(),
            TokenKind::Newline => "end of line".to_string(),
            TokenKind::Eof => "end of file".to_string(),
        }
    }
}

pub struct Lexer<'src> {
    chars: Peekable<Chars<'src>>,
    line: u32,
    col: u32,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            col: 1,
        }
    }

    fn loc(&self) -> Location {
        Location::new(self.line, self.col)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    /// Consumes the remainder of the current line verbatim, leaving the
    /// newline itself for the next token. Used for raw guard expressions
    /// and passthrough statement bodies.
    pub fn take_rest_of_line(&mut self) -> String {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            text.push(c);
            self.advance();
        }
        text.trim().to_string()
    }

    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        loop {
            let loc = self.loc();
            let c = match self.peek() {
                Some(c) => c,
                None => {
                    return Ok(Token {
                        kind: TokenKind::Eof,
                        loc,
                    })
                }
            };
            match c {
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '#' => {
                    // comment to end of line
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                '\n' => {
                    self.advance();
                    return Ok(Token {
                        kind: TokenKind::Newline,
                        loc,
                    });
                }
                '"' => return self.lex_string(loc),
                '$' => return self.lex_template(loc),
                c if c.is_ascii_digit() => return self.lex_number(loc),
                c if c.is_ascii_alphabetic() || c == '_' => return self.lex_ident(loc),
                c => {
                    let kind = match c {
                        '[' => TokenKind::LBracket,
                        ']' => TokenKind::RBracket,
                        '(' => TokenKind::LParen,
                        ')' => TokenKind::RParen,
                        '{' => TokenKind::LBrace,
                        '}' => TokenKind::RBrace,
                        ',' => TokenKind::Comma,
                        ':' => TokenKind::Colon,
                        '=' => TokenKind::Eq,
                        other => return Err(ParseError::UnexpectedChar { ch: other, loc }),
                    };
                    self.advance();
                    return Ok(Token { kind, loc });
                }
            }
        }
    }

    fn lex_ident(&mut self, loc: Location) -> Result<Token, ParseError> {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == crate::VARIANT_SEP {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        Ok(Token {
            kind: TokenKind::Ident(StringId::new(&text)),
            loc,
        })
    }

    fn lex_number(&mut self, loc: Location) -> Result<Token, ParseError> {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            u64::from_str_radix(hex, 16)
        } else if text.len() > 1 && text.starts_with('0') {
            u64::from_str_radix(&text[1..], 8)
        } else {
            text.parse()
        };
        match parsed {
            Ok(value) => Ok(Token {
                kind: TokenKind::Number { text, value },
                loc,
            }),
            Err(_) => Err(ParseError::InvalidNumber { text, loc }),
        }
    }

    fn lex_template(&mut self, loc: Location) -> Result<Token, ParseError> {
        self.advance();
        let mut digits = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                digits.push(c);
                self.advance();
            } else {
                break;
            }
        }
        match digits.parse() {
            Ok(id) => Ok(Token {
                kind: TokenKind::Template(id),
                loc,
            }),
            Err(_) => Err(ParseError::UnexpectedChar { ch: '$', loc }),
        }
    }

    fn lex_string(&mut self, loc: Location) -> Result<Token, ParseError> {
        self.advance();
        let mut text = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => return Err(ParseError::UnterminatedString { loc }),
                Some('"') => {
                    self.advance();
                    return Ok(Token {
                        kind: TokenKind::Str(text),
                        loc,
                    });
                }
                Some('\\') => {
                    self.advance();
                    match self.peek() {
                        Some('"') => {
                            text.push('"');
                            self.advance();
                        }
                        Some('\\') => {
                            text.push('\\');
                            self.advance();
                        }
                        // other escapes pass through for the target language
                        Some(c) => {
                            text.push('\\');
                            text.push(c);
                            self.advance();
                        }
                        None => return Err(ParseError::UnterminatedString { loc }),
                    }
                }
                Some(c) => {
                    text.push(c);
                    self.advance();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sid;

    fn collect(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src);
        let mut kinds = Vec::new();
        loop {
            let tok = lexer.next_token().unwrap();
            let done = tok.kind == TokenKind::Eof;
            kinds.push(tok.kind);
            if done {
                break;
            }
        }
        kinds
    }

    #[test]
    fn lexes_idents_with_variant_separator() {
        let kinds = collect("prctl$PR_CAP_AMBIENT");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident(sid("prctl$PR_CAP_AMBIENT")),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn number_keeps_source_radix() {
        let kinds = collect("47 0x2f 057");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Number {
                    text: "47".to_string(),
                    value: 47
                },
                TokenKind::Number {
                    text: "0x2f".to_string(),
                    value: 47
                },
                TokenKind::Number {
                    text: "057".to_string(),
                    value: 47
                },
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn template_placeholder_lexes_at_token_start() {
        let kinds = collect("[$12]");
        assert_eq!(
            kinds,
            vec![
                TokenKind::LBracket,
                TokenKind::Template(12),
                TokenKind::RBracket,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn comments_are_skipped_but_newlines_kept() {
        let kinds = collect("a # trailing words\nb");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident(sid("a")),
                TokenKind::Newline,
                TokenKind::Ident(sid("b")),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn string_unescapes_quotes_only() {
        let kinds = collect(r#""say \"hi\" \n""#);
        assert_eq!(
            kinds,
            vec![
                TokenKind::Str("say \"hi\" \\n".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn rest_of_line_is_raw() {
        let mut lexer = Lexer::new("if defined(__NR_prctl) && X\nnext");
        let tok = lexer.next_token().unwrap();
        assert_eq!(tok.kind, TokenKind::Ident(sid("if")));
        assert_eq!(lexer.take_rest_of_line(), "defined(__NR_prctl) && X");
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Newline);
    }

    #[test]
    fn bad_number_is_rejected() {
        let mut lexer = Lexer::new("0xzz");
        let err = lexer.next_token().unwrap_err();
        assert!(matches!(err, ParseError::InvalidNumber { .. }));
    }
}
