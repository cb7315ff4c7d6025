//! Lexer (mechanical per §1 — the shape of the tokens matters only
//! insofar as the grammar in §6.1 needs them; the implementation itself
//! is not part of the hard core).

use logos::Logos;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\f]+")]
#[logos(skip r"--[^\n]*")]
#[logos(skip r"/\*([^*]|\*[^/])*\*/")]
pub enum Token<'src> {
    #[token("\n")]
    Newline,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident(&'src str),

    #[regex(r"`[^`]*`")]
    BacktickIdent(&'src str),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*!")]
    MacroRefName(&'src str),

    #[regex(r"@[A-Za-z_][A-Za-z0-9_]*")]
    AtDirective(&'src str),

    #[regex(r"'([^'\\]|\\.)*'")]
    SqlString(&'src str),

    #[regex(r#""([^"\\]|\\.)*""#)]
    CString(&'src str),

    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?")]
    RealLit(&'src str),

    #[regex(r"[0-9]+L")]
    LongLit(&'src str),

    #[regex(r"[0-9]+")]
    IntLit(&'src str),

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token(".")]
    Dot,
    #[token("*")]
    Star,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("=")]
    Eq,
    #[token("==")]
    EqEq,
    #[token("<>")]
    Neq,
    #[token("!=")]
    BangEq,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token(":=")]
    ColonEq,
    #[token(":")]
    Colon,

    #[regex(r"\?\?")]
    CoalesceOp,
}

/// A position-annotated token stream, adapted from `logos::Lexer`, that
/// also tracks line numbers (the only position unit this compiler cares
/// about per §3.1).
pub struct LineTokenizer<'src> {
    inner: logos::Lexer<'src, Token<'src>>,
    line: u32,
}

pub struct Spanned<'src> {
    pub token: Token<'src>,
    pub line: u32,
    pub text: &'src str,
}

impl<'src> LineTokenizer<'src> {
    pub fn new(src: &'src str) -> Self {
        Self {
            inner: Token::lexer(src),
            line: 1,
        }
    }
}

impl<'src> Iterator for LineTokenizer<'src> {
    type Item = Spanned<'src>;

    fn next(&mut self) -> Option<Spanned<'src>> {
        loop {
            let tok = self.inner.next()?;
            let text = self.inner.slice();
            let tok = match tok {
                Ok(t) => t,
                Err(_) => continue, // lexer errors are out of scope; skip
            };
            if matches!(tok, Token::Newline) {
                self.line += 1;
                continue;
            }
            return Some(Spanned {
                token: tok,
                line: self.line,
                text,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_line_numbers_across_newlines() {
        let src = "select\n1\nfrom t";
        let toks: Vec<_> = LineTokenizer::new(src).collect();
        assert_eq!(toks[0].line, 1);
        assert_eq!(toks[1].line, 2);
        assert_eq!(toks[2].line, 3);
    }

    #[test]
    fn lexes_macro_ref_name_with_bang() {
        let src = "inc!(5)";
        let toks: Vec<_> = LineTokenizer::new(src).collect();
        assert!(matches!(toks[0].token, Token::MacroRefName("inc!")));
    }
}
