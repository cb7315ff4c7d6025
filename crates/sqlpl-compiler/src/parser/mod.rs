//! Parser: lexer, recursive-descent grammar, and AST construction.
//!
//! §1 explicitly scopes the lexer and grammar out as "a mechanical
//! exercise" — what matters is that the AST shape produced matches §3.
//! This module covers the subset of §6.1's surface needed to exercise
//! every downstream pass (macro expansion, semantic analysis, the
//! regenerator) end to end, not a complete SQL grammar.

pub mod error;
pub mod grammar;
pub mod lexer;

#[cfg(test)]
mod tests;

use lexer::{LineTokenizer, Token};
use sqlpl_core::arena::{Arena, FileId, NodeId};

pub use error::ParseError;

/// Parser state: a lookahead buffer over the token stream plus the
/// shared AST arena every constructor writes into.
///
/// `'src` is the lifetime of the source text (token slices borrow it);
/// `'a` is the (unrelated) lifetime of the mutable arena borrow.
pub struct Parser<'src, 'a> {
    tokens: Vec<(Token<'src>, u32, &'src str)>,
    pos: usize,
    pub arena: &'a mut Arena,
    pub file: FileId,
    filename: String,
}

impl<'src, 'a> Parser<'src, 'a> {
    pub fn new(source: &'src str, filename: &str, arena: &'a mut Arena) -> Self {
        let tokens: Vec<_> = LineTokenizer::new(source)
            .map(|s| (s.token, s.line, s.text))
            .collect();
        let file = arena.file(filename);
        Self {
            tokens,
            pos: 0,
            arena,
            file,
            filename: filename.to_owned(),
        }
    }

    pub fn peek(&self) -> Option<&Token<'src>> {
        self.tokens.get(self.pos).map(|(t, ..)| t)
    }

    pub fn peek_nth(&self, n: usize) -> Option<&Token<'src>> {
        self.tokens.get(self.pos + n).map(|(t, ..)| t)
    }

    pub fn peek_text(&self) -> Option<&'src str> {
        self.tokens.get(self.pos).map(|(_, _, t)| *t)
    }

    pub fn current_line(&self) -> u32 {
        self.tokens
            .get(self.pos)
            .map(|(_, l, _)| *l)
            .or_else(|| self.tokens.last().map(|(_, l, _)| *l))
            .unwrap_or(1)
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn advance(&mut self) -> Option<(Token<'src>, u32, &'src str)> {
        let item = self.tokens.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    /// True if the next token is an identifier matching `kw`
    /// case-insensitively (keywords are just identifiers lexically).
    pub fn at_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s.eq_ignore_ascii_case(kw))
    }

    pub fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.at_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn expect_keyword(&mut self, kw: &str) -> Result<(), ParseError> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected '{}', found {:?}",
                kw,
                self.peek_text().unwrap_or("<eof>")
            )))
        }
    }

    pub fn eat_token(&mut self, tok: &Token<'src>) -> bool {
        if self.peek() == Some(tok) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn expect_token(&mut self, tok: Token<'src>) -> Result<(), ParseError> {
        if self.eat_token(&tok) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected {:?}, found {:?}",
                tok,
                self.peek_text().unwrap_or("<eof>")
            )))
        }
    }

    pub fn expect_ident(&mut self) -> Result<&'src str, ParseError> {
        match self.peek().cloned() {
            Some(Token::Ident(s)) => {
                self.advance();
                Ok(s)
            }
            other => Err(self.error(format!("expected identifier, found {:?}", other))),
        }
    }

    pub fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            file: self.filename.clone(),
            line: self.current_line(),
            message: message.into(),
        }
    }

    pub fn line_for(&self, pos: usize) -> u32 {
        self.tokens.get(pos).map(|(_, l, _)| *l).unwrap_or(1)
    }
}

/// Parse `source` (from `filename`) into a `Program` node in `arena`.
/// Returns the root `NodeId`, or the first fatal parse error (§7: parse
/// errors are fatal, unlike macro/semantic errors which accumulate).
pub fn parse(source: &str, filename: &str, arena: &mut Arena) -> Result<NodeId, ParseError> {
    let mut parser = Parser::new(source, filename, arena);
    grammar::parse_program(&mut parser)
}
