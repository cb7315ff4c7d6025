//! Pass driver (C6): orchestrates parse -> macro-expand -> semantic
//! analyze -> regenerate as one pipeline over a single, reusable
//! `Compiler` value.

use std::collections::HashSet;

use sqlpl_core::arena::{Arena, NodeId};
use sqlpl_core::Diagnostics;

use crate::analyze::Analyzer;
use crate::macros;
use crate::parser::{self, ParseError};
use crate::regen::{self, EchoCallbacks, RegenMode, RegenOptions, Regenerator};

/// Failure modes of [`Compiler::compile`] outside of the accumulated
/// [`Diagnostics`] (§7: lex/parse errors are fatal and surface
/// immediately; macro and semantic errors accumulate across their whole
/// pass and are reported together once the pass finishes).
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("macro expansion failed with {0} error(s)")]
    MacroExpand(usize),
    #[error("semantic analysis failed with {0} error(s)")]
    Semantic(usize),
}

pub type CompileResult<T> = Result<T, CompileError>;

/// One source file's compiled program: the AST root, still living in
/// the owning [`Compiler`]'s arena.
pub struct CompiledUnit {
    pub root: NodeId,
}

/// Owns every piece of process-wide state for one compile (§5
/// "process-wide singletons... re-initialized at the top of
/// `compile()`"): the AST arena and the diagnostics collection. The
/// semantic analyzer's own state (symbol tables, schema registries, flow
/// stack) lives only for the duration of one `compile()` call, since
/// `Analyzer` borrows `self.diagnostics` and is built fresh each time.
///
/// Reusing one `Compiler` across files (rather than constructing a new
/// one per file) is what the spec calls "amalgam mode" — `reset()` gives
/// the same guarantee a fresh `Compiler::new()` would, without the
/// reallocation.
#[derive(Default)]
pub struct Compiler {
    pub arena: Arena,
    pub diagnostics: Diagnostics,
    defines: HashSet<String>,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-initialize every subsystem (§5), so the same `Compiler` can be
    /// reused across compiles in one process without carrying over state
    /// from the previous file.
    pub fn reset(&mut self) {
        self.arena.cleanup();
        self.diagnostics = Diagnostics::new();
    }

    /// Define a preprocessor symbol (`-D name`, §6.2), consulted by
    /// `@IFDEF` during macro expansion.
    pub fn define(&mut self, name: impl Into<String>) {
        self.defines.insert(name.into());
    }

    /// Run parse -> macro-expand -> semantic-analyze over `source`.
    ///
    /// A parse error aborts immediately. Macro and semantic errors are
    /// left in `self.diagnostics` for the caller to render (§6.3's wire
    /// format, or `annotate-snippets`); the returned `Err` only carries
    /// the error count, since the messages themselves are already in
    /// `self.diagnostics`.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, source), fields(filename)))]
    pub fn compile(&mut self, source: &str, filename: &str) -> CompileResult<CompiledUnit> {
        let root = parser::parse(source, filename, &mut self.arena)?;

        if !macros::expand_program(&mut self.arena, root, &self.defines, &mut self.diagnostics) {
            return Err(CompileError::MacroExpand(self.diagnostics.error_count()));
        }

        let mut analyzer = Analyzer::new(&mut self.diagnostics);
        analyzer.run(&mut self.arena, root);
        if self.diagnostics.has_errors() {
            return Err(CompileError::Semantic(self.diagnostics.error_count()));
        }

        Ok(CompiledUnit { root })
    }

    /// Regenerate SQLite-acceptable SQL (§4.5's "Sqlite" master): kinds
    /// stripped, aliases minified, bound-variable placeholders collected
    /// via [`regen::BindingCallbacks`].
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub fn regenerate_sqlite(&self, unit: &CompiledUnit) -> (String, Vec<String>) {
        let options = RegenOptions { mode: RegenMode::Sqlite, minify_aliases: true, ..Default::default() };
        let mut gen = Regenerator::new(&self.arena, regen::BindingCallbacks::default(), options);
        let text = gen.regenerate(unit.root);
        (text, gen.into_callbacks().bound_vars)
    }

    /// Echo the source back unmodified (§4.5's "Echo" master), e.g. for
    /// pairing a diagnostic with the statement text it's about.
    pub fn regenerate_echo(&self, unit: &CompiledUnit) -> String {
        let options = RegenOptions { mode: RegenMode::Echo, ..Default::default() };
        let mut gen = Regenerator::new(&self.arena, EchoCallbacks, options);
        gen.regenerate(unit.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_source_compiles_and_regenerates() {
        let mut compiler = Compiler::new();
        let unit = compiler
            .compile("CREATE TABLE t (id INT NOT NULL PRIMARY KEY); SELECT id FROM t;", "t.sql")
            .expect("compiles cleanly");
        let (sql, _bound) = compiler.regenerate_sqlite(&unit);
        assert!(sql.contains("SELECT"));
    }

    #[test]
    fn semantic_error_is_reported_not_panicked() {
        let mut compiler = Compiler::new();
        let err = compiler.compile("SELECT id FROM missing;", "t.sql").unwrap_err();
        assert!(matches!(err, CompileError::Semantic(_)));
        assert!(compiler.diagnostics.has_errors());
    }

    #[test]
    fn parse_error_is_fatal_and_immediate() {
        let mut compiler = Compiler::new();
        let err = compiler.compile("CREATE TABLE (;", "t.sql").unwrap_err();
        assert!(matches!(err, CompileError::Parse(_)));
    }

    #[test]
    fn reset_clears_state_between_compiles() {
        let mut compiler = Compiler::new();
        let _ = compiler.compile("SELECT id FROM missing;", "t.sql");
        assert!(compiler.diagnostics.has_errors());
        compiler.reset();
        assert!(compiler.diagnostics.is_empty());
        assert!(compiler.arena.is_empty());
    }

    #[test]
    fn define_gates_ifdef_blocks() {
        let mut compiler = Compiler::new();
        compiler.define("FEATURE_X");
        let unit = compiler
            .compile("@IFDEF FEATURE_X CREATE TABLE t (id INT NOT NULL PRIMARY KEY); @ENDIF SELECT id FROM t;", "t.sql")
            .expect("compiles cleanly once FEATURE_X is defined");
        let _ = unit;
    }
}
