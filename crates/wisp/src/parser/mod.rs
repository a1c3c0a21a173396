//! Recursive-descent s-expression reader.
//!
//! Turns the token stream from [`crate::lexer::Lexer`] into a tree of
//! [`Sexpr`] nodes. Reader macros (`'x`, `` `x ``, `,x`, `,@x`) are rewritten
//! here into ordinary two-element lists (`(quote x)` and friends) so that
//! every later phase only has to understand plain list structure.

mod sexpr;

pub use sexpr::{Sexpr, SexprNode};

use crate::error::ParseError;
use crate::lexer::{Lexer, Token, TokenKind};
use crate::location::CodeRange;

pub struct Parser<'a> {
    lexer: Lexer<'a>,
}

impl<'a> Parser<'a> {
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        Self { lexer: Lexer::new(input) }
    }

    /// Parses every top-level form in the input.
    pub fn parse_program(&mut self) -> Result<Vec<SexprNode>, ParseError> {
        let mut forms = vec![];
        loop {
            if self.lexer.peek()?.kind == TokenKind::Eof {
                break;
            }
            forms.push(self.parse_sexpr()?);
        }
        Ok(forms)
    }

    /// Parses a single s-expression, consuming the tokens it spans.
    pub fn parse_sexpr(&mut self) -> Result<SexprNode, ParseError> {
        let tok = self.lexer.next_token()?;
        match tok.kind {
            TokenKind::Eof => Err(ParseError::UnexpectedToken { found: "<eof>".to_owned(), loc: tok.loc }),
            TokenKind::LParen => self.parse_list(tok.loc),
            TokenKind::RParen => Err(ParseError::UnexpectedToken { found: ")".to_owned(), loc: tok.loc }),
            TokenKind::Number => self.parse_number(&tok),
            TokenKind::String => Ok(SexprNode::new(Sexpr::Str(tok.text), tok.loc)),
            TokenKind::Symbol => Ok(SexprNode::new(Sexpr::Symbol(tok.text), tok.loc)),
            TokenKind::Quote | TokenKind::Quasiquote | TokenKind::Unquote | TokenKind::UnquoteSplicing => {
                self.parse_reader_macro(&tok)
            }
        }
    }

    fn parse_number(&self, tok: &Token) -> Result<SexprNode, ParseError> {
        let n: f64 = tok
            .text
            .parse()
            .map_err(|_| ParseError::UnexpectedToken { found: tok.text.clone(), loc: tok.loc })?;
        Ok(SexprNode::new(Sexpr::Number(n), tok.loc))
    }

    fn parse_reader_macro(&mut self, tok: &Token) -> Result<SexprNode, ParseError> {
        let name = tok.kind.reader_macro_symbol().expect("reader-macro token kind");
        if self.lexer.peek()?.kind == TokenKind::Eof {
            // spec.md §4.3: EOF right after a reader macro is reported at the
            // macro's own location, not the EOF token's.
            return Err(ParseError::UnexpectedToken { found: "<eof>".to_owned(), loc: tok.loc });
        }
        let inner = self.parse_sexpr()?;
        let loc = tok.loc.to(inner.loc);
        let list = vec![SexprNode::new(Sexpr::Symbol(name.to_owned()), tok.loc), inner];
        Ok(SexprNode::new(Sexpr::List(list), loc))
    }

    fn parse_list(&mut self, opened_at: CodeRange) -> Result<SexprNode, ParseError> {
        let mut items = vec![];
        loop {
            let peeked = self.lexer.peek()?;
            match peeked.kind {
                TokenKind::Eof => return Err(ParseError::UnterminatedList { opened_at }),
                TokenKind::RParen => {
                    let close = self.lexer.next_token()?;
                    return Ok(SexprNode::new(Sexpr::List(items), opened_at.to(close.loc)));
                }
                _ => items.push(self.parse_sexpr()?),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(src: &str) -> SexprNode {
        let mut parser = Parser::new(src);
        let mut forms = parser.parse_program().expect("parse ok");
        assert_eq!(forms.len(), 1);
        forms.remove(0)
    }

    #[test]
    fn parses_nested_lists() {
        let node = parse_one("(+ 1 (* 2 3))");
        let items = node.as_list().expect("list");
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_symbol(), Some("+"));
        let nested = items[2].as_list().expect("nested list");
        assert_eq!(nested[0].as_symbol(), Some("*"));
    }

    #[test]
    fn quote_reader_macro_expands_to_quote_form() {
        let node = parse_one("'(1 2)");
        let items = node.as_list().expect("list");
        assert_eq!(items[0].as_symbol(), Some("quote"));
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn unquote_splicing_expands_correctly() {
        let node = parse_one("`(a ,@b)");
        let outer = node.as_list().expect("list");
        assert_eq!(outer[0].as_symbol(), Some("quasiquote"));
        let quoted = outer[1].as_list().expect("quoted list");
        let spliced = quoted[1].as_list().expect("unquote-splicing form");
        assert_eq!(spliced[0].as_symbol(), Some("unquote-splicing"));
    }

    #[test]
    fn unterminated_list_is_an_error() {
        let mut parser = Parser::new("(+ 1 2");
        let err = parser.parse_program().unwrap_err();
        assert!(matches!(err, ParseError::UnterminatedList { .. }));
    }

    #[test]
    fn eof_after_a_reader_macro_is_reported_at_the_macros_location() {
        let mut parser = Parser::new("'");
        let err = parser.parse_program().unwrap_err();
        match err {
            ParseError::UnexpectedToken { found, loc } => {
                assert_eq!(found, "<eof>");
                assert_eq!(loc, crate::location::CodeRange::new(crate::location::Pos::new(1, 1), crate::location::Pos::new(1, 2)));
            }
            other => panic!("expected UnexpectedToken, got {other:?}"),
        }
    }

    #[test]
    fn unexpected_closing_paren_is_an_error() {
        let mut parser = Parser::new(")");
        let err = parser.parse_program().unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { .. }));
    }

    #[test]
    fn multiple_top_level_forms_are_all_returned() {
        let mut parser = Parser::new("1 2 3");
        let forms = parser.parse_program().expect("parse ok");
        assert_eq!(forms.len(), 3);
    }
}
