//! Byte-stream tokenizer.
//!
//! Hand-rolled rather than built on a parser-generator crate: the
//! s-expression lexical grammar is simple enough (balanced parens, one
//! string-escape table, one number grammar) that a dependency there would
//! be pure overhead for no expressiveness gained.

mod token;

pub use token::{Token, TokenKind};

use crate::error::{LexError, LexErrorKind};
use crate::location::{CodeRange, Pos};

/// Delimiters: `()"';` and whitespace. Note that `` ` `` and `,` are
/// deliberately *not* delimiters; they only start a token when encountered
/// at the beginning of a scan, so a bare `` ` `` or `,` mid-symbol does not
/// split it.
fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'"' | b'\'' | b';') || b.is_ascii_whitespace()
}

pub struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    col: u32,
    peeked: Option<Token>,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        Self { input, bytes: input.as_bytes(), pos: 0, line: 1, col: 1, peeked: None }
    }

    fn current(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_byte_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn pos_now(&self) -> Pos {
        Pos::new(self.line, self.col)
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.current()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(b)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.current() {
                Some(b) if b.is_ascii_whitespace() => {
                    self.advance();
                }
                Some(b';') => {
                    while let Some(b) = self.current() {
                        if b == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    /// Returns the next token without consuming it. Single-token lookahead
    /// only.
    pub fn peek(&mut self) -> Result<&Token, LexError> {
        if self.peeked.is_none() {
            let tok = self.scan_token()?;
            self.peeked = Some(tok);
        }
        Ok(self.peeked.as_ref().expect("just populated"))
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        if let Some(tok) = self.peeked.take() {
            return Ok(tok);
        }
        self.scan_token()
    }

    fn scan_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace_and_comments();
        let start = self.pos_now();
        let Some(b) = self.current() else {
            return Ok(Token { kind: TokenKind::Eof, text: String::new(), loc: CodeRange::new(start, start) });
        };

        match b {
            b'(' => {
                self.advance();
                Ok(self.simple_token(TokenKind::LParen, "(", start))
            }
            b')' => {
                self.advance();
                Ok(self.simple_token(TokenKind::RParen, ")", start))
            }
            b'\'' => {
                self.advance();
                Ok(self.simple_token(TokenKind::Quote, "'", start))
            }
            b'`' => {
                self.advance();
                Ok(self.simple_token(TokenKind::Quasiquote, "`", start))
            }
            b',' => {
                self.advance();
                if self.current() == Some(b'@') {
                    self.advance();
                    Ok(self.simple_token(TokenKind::UnquoteSplicing, ",@", start))
                } else {
                    Ok(self.simple_token(TokenKind::Unquote, ",", start))
                }
            }
            b'"' => self.scan_string(start),
            _ => self.scan_atom(start),
        }
    }

    fn simple_token(&self, kind: TokenKind, text: &str, start: Pos) -> Token {
        Token { kind, text: text.to_owned(), loc: CodeRange::new(start, self.pos_now()) }
    }

    fn scan_string(&mut self, start: Pos) -> Result<Token, LexError> {
        self.advance(); // opening quote
        let mut out = String::new();
        loop {
            match self.current() {
                None => {
                    return Err(LexError {
                        kind: LexErrorKind::UnterminatedString,
                        message: "unterminated string literal".to_owned(),
                        loc: CodeRange::new(start, self.pos_now()),
                    });
                }
                Some(b'"') => {
                    self.advance();
                    break;
                }
                Some(b'\\') => {
                    let esc_start = self.pos_now();
                    self.advance();
                    match self.current() {
                        Some(b'n') => {
                            out.push('\n');
                            self.advance();
                        }
                        Some(b't') => {
                            out.push('\t');
                            self.advance();
                        }
                        Some(b'"') => {
                            out.push('"');
                            self.advance();
                        }
                        Some(b'\\') => {
                            out.push('\\');
                            self.advance();
                        }
                        other => {
                            return Err(LexError {
                                kind: LexErrorKind::UnknownEscape,
                                message: format!(
                                    "unknown escape sequence \\{}",
                                    other.map_or_else(|| "<eof>".to_owned(), |b| (b as char).to_string())
                                ),
                                loc: CodeRange::new(esc_start, self.pos_now()),
                            });
                        }
                    }
                }
                Some(_) => {
                    // `self.input` is valid UTF-8, so a full char always
                    // starts at `self.pos` here; decode it from the
                    // underlying str instead of casting its raw bytes.
                    let ch = self.input[self.pos..].chars().next().expect("current() returned Some");
                    for _ in 0..ch.len_utf8() {
                        self.advance();
                    }
                    out.push(ch);
                }
            }
        }
        Ok(Token { kind: TokenKind::String, text: out, loc: CodeRange::new(start, self.pos_now()) })
    }

    fn scan_atom(&mut self, start: Pos) -> Result<Token, LexError> {
        let byte_start = self.pos;
        while let Some(b) = self.current() {
            if is_delimiter(b) {
                break;
            }
            self.advance();
        }
        let lexeme = &self.input[byte_start..self.pos];
        let loc = CodeRange::new(start, self.pos_now());

        if looks_like_number(lexeme) {
            if is_valid_number(lexeme) {
                Ok(Token { kind: TokenKind::Number, text: lexeme.to_owned(), loc })
            } else {
                Err(LexError {
                    kind: LexErrorKind::BadNumber,
                    message: format!("malformed number literal `{lexeme}`"),
                    loc,
                })
            }
        } else {
            Ok(Token { kind: TokenKind::Symbol, text: lexeme.to_owned(), loc })
        }
    }
}

/// A lexeme "looks like a number" if it starts with a digit, or a sign
/// followed by a digit or a dot. Otherwise it is unambiguously a symbol
/// (e.g. `-`, `+`, `->foo` are all valid symbols).
fn looks_like_number(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('+' | '-') => matches!(chars.next(), Some(c) if c.is_ascii_digit() || c == '.'),
        _ => false,
    }
}

/// Decimal grammar: `sign? digit+ ('.' digit+)? (('e'|'E') sign? digit+)?`.
fn is_valid_number(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == int_start {
        return false;
    }
    if bytes.get(i) == Some(&b'.') {
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == frac_start {
            return false;
        }
    }
    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        i += 1;
        if matches!(bytes.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        let exp_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return false;
        }
    }
    i == bytes.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src);
        let mut out = vec![];
        loop {
            let tok = lexer.next_token().expect("lex ok");
            if tok.kind == TokenKind::Eof {
                break;
            }
            out.push(tok.kind);
        }
        out
    }

    #[test]
    fn tokenizes_a_simple_list() {
        assert_eq!(
            kinds("(+ 1 2.5 \"hi\")"),
            vec![
                TokenKind::LParen,
                TokenKind::Symbol,
                TokenKind::Number,
                TokenKind::Number,
                TokenKind::String,
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn reader_macros_produce_dedicated_tokens() {
        assert_eq!(
            kinds("'x `(a ,b ,@c)"),
            vec![
                TokenKind::Quote,
                TokenKind::Symbol,
                TokenKind::Quasiquote,
                TokenKind::LParen,
                TokenKind::Symbol,
                TokenKind::Unquote,
                TokenKind::Symbol,
                TokenKind::UnquoteSplicing,
                TokenKind::Symbol,
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn comments_and_whitespace_are_skipped() {
        assert_eq!(kinds("  ; a comment\n  42 ; trailing\n"), vec![TokenKind::Number]);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let mut lexer = Lexer::new("\"abc");
        let err = lexer.next_token().unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnterminatedString);
    }

    #[test]
    fn unknown_escape_is_an_error() {
        let mut lexer = Lexer::new("\"a\\qb\"");
        let err = lexer.next_token().unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnknownEscape);
    }

    #[test]
    fn malformed_number_is_an_error() {
        let mut lexer = Lexer::new("1.2.3");
        let err = lexer.next_token().unwrap_err();
        assert_eq!(err.kind, LexErrorKind::BadNumber);
    }

    #[test]
    fn signed_atoms_that_are_not_numbers_are_symbols() {
        assert_eq!(kinds("- + -> +foo"), vec![TokenKind::Symbol; 4]);
    }

    #[test]
    fn non_ascii_string_literals_decode_to_the_right_codepoints() {
        let mut lexer = Lexer::new("\"café 猫\"");
        let tok = lexer.next_token().expect("lex ok");
        assert_eq!(tok.kind, TokenKind::String);
        assert_eq!(tok.text, "café 猫");
    }

    #[test]
    fn lexer_round_trip_preserves_token_kinds() {
        let src = "(+ 1 2 3)";
        let original = kinds(src);
        let mut lexer = Lexer::new(src);
        let mut lexemes = vec![];
        loop {
            let tok = lexer.next_token().expect("lex ok");
            if tok.kind == TokenKind::Eof {
                break;
            }
            lexemes.push(tok.text);
        }
        let rejoined = lexemes.join(" ");
        assert_eq!(kinds(&rejoined), original);
    }
}
