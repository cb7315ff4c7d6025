//! Rendering of a `Diagnostics` collection.

use std::fmt::Write as _;

use annotate_snippets::{AnnotationKind, Level, Renderer, Snippet};

use super::collection::Diagnostics;

/// Builder-style renderer, grounded on the teacher's
/// `DiagnosticsPrinter` (`plotnik-lib::diagnostics::printer`).
pub struct DiagnosticsPrinter<'d> {
    diagnostics: &'d Diagnostics,
}

impl<'d> DiagnosticsPrinter<'d> {
    pub fn new(diagnostics: &'d Diagnostics) -> Self {
        Self { diagnostics }
    }

    /// The exact §6.3 wire format, one message per line (macro frames
    /// appended as extra lines within the same message), messages
    /// separated by `\n`. This is the authoritative, testable output.
    pub fn render_plain(&self) -> String {
        let mut out = String::new();
        for (i, msg) in self.diagnostics.messages().iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            write!(out, "{}", msg).expect("String write never fails");
        }
        out
    }

    /// A human-friendly multi-line snippet view for a given source file's
    /// text, grouped by statement (§7 "grouped by statement in source
    /// order"). Falls back to the plain line if a message's line number
    /// is out of range for `source`.
    pub fn render_pretty(&self, path: &str, source: &str) -> String {
        let renderer = Renderer::styled();
        let mut out = String::new();
        for (i, msg) in self.diagnostics.messages().iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let Some(range) = line_byte_range(source, msg.line) else {
                write!(out, "{}", msg).expect("String write never fails");
                continue;
            };
            let level = match msg.severity {
                super::message::Severity::Error => Level::ERROR,
                super::message::Severity::Warning => Level::WARNING,
            };
            let snippet = Snippet::source(source)
                .path(path)
                .line_start(1)
                .annotation(AnnotationKind::Primary.span(range).label(&msg.message));
            let group = level.primary_title(&msg.message).element(snippet);
            write!(out, "{}", renderer.render(&[group])).expect("String write never fails");
        }
        out
    }
}

/// Byte range of line `lineno` (1-based) within `source`, for snippet
/// rendering. This is a convenience mapping, not an AST span — the
/// compiler only ever tracks line numbers (§3.1), not columns.
fn line_byte_range(source: &str, lineno: u32) -> Option<std::ops::Range<usize>> {
    if lineno == 0 {
        return None;
    }
    let mut start = 0usize;
    for (i, line) in source.split_inclusive('\n').enumerate() {
        if (i as u32 + 1) == lineno {
            let end = (start + line.trim_end_matches('\n').len()).max(start + 1).min(source.len());
            return Some(start..end);
        }
        start += line.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::super::collection::Diagnostics;

    #[test]
    fn render_plain_matches_display() {
        let mut d = Diagnostics::new();
        d.error("t.sql", 3, "oops").ast_kind("select_stmt").emit();
        let printer = d.printer();
        assert_eq!(printer.render_plain(), "t.sql:3:1: error: in select_stmt : oops");
    }

    #[test]
    fn render_pretty_does_not_panic_on_empty() {
        let d = Diagnostics::new();
        let printer = d.printer();
        assert_eq!(printer.render_pretty("t.sql", ""), "");
    }
}
