//! Collection of diagnostics accumulated over one compile (§7 "Recovery
//! policy": analysis never bails on first error, so this grows across an
//! entire pass).

use super::message::{DiagnosticMessage, MacroFrame, Severity};

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    messages: Vec<DiagnosticMessage>,
}

/// Builder for one diagnostic, returned by `Diagnostics::error`/`warning`.
#[must_use = "diagnostic not recorded until .emit()"]
pub struct DiagnosticBuilder<'a> {
    diagnostics: &'a mut Diagnostics,
    message: DiagnosticMessage,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, file: impl Into<String>, line: u32, msg: impl Into<String>) -> DiagnosticBuilder<'_> {
        DiagnosticBuilder {
            diagnostics: self,
            message: DiagnosticMessage::new(Severity::Error, file, line, msg),
        }
    }

    pub fn warning(&mut self, file: impl Into<String>, line: u32, msg: impl Into<String>) -> DiagnosticBuilder<'_> {
        DiagnosticBuilder {
            diagnostics: self,
            message: DiagnosticMessage::new(Severity::Warning, file, line, msg),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(DiagnosticMessage::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.messages.iter().filter(|d| d.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.messages.iter().filter(|d| d.is_warning()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiagnosticMessage> {
        self.messages.iter()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.messages.extend(other.messages);
    }

    pub fn printer<'a>(&'a self) -> super::printer::DiagnosticsPrinter<'a> {
        super::printer::DiagnosticsPrinter::new(self)
    }

    pub(crate) fn messages(&self) -> &[DiagnosticMessage] {
        &self.messages
    }
}

impl<'a> DiagnosticBuilder<'a> {
    pub fn ast_kind(mut self, kind: impl Into<String>) -> Self {
        self.message.ast_kind = Some(kind.into());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.message.subject = Some(subject.into());
        self
    }

    pub fn macro_frame(mut self, name: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        self.message.macro_trace.push(MacroFrame {
            macro_name: name.into(),
            file: file.into(),
            line,
        });
        self
    }

    pub fn emit(self) {
        self.diagnostics.messages.push(self.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovery_continues_past_first_error() {
        let mut d = Diagnostics::new();
        d.error("a.sql", 1, "first").emit();
        d.error("a.sql", 2, "second").emit();
        assert_eq!(d.error_count(), 2);
        assert!(d.has_errors());
    }
}
