//! A single diagnostic message and the §6.3 wire format.

use std::fmt;

/// One frame of a macro expansion trace (§4.3 "Errors", §6.3): the macro
/// name and the call site that invoked it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MacroFrame {
    pub macro_name: String,
    pub file: String,
    pub line: u32,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

/// A fully-formed diagnostic, matching §6.3:
/// `<file>:<line>:1: error: [in <ast_kind> :] <message>[ ('<subject>')]`
/// followed by one ` -> in '<macro>!' at <file>:<line>` line per macro
/// frame, outermost last.
#[derive(Clone, Debug)]
pub struct DiagnosticMessage {
    pub severity: Severity,
    pub file: String,
    pub line: u32,
    pub ast_kind: Option<String>,
    pub message: String,
    pub subject: Option<String>,
    pub macro_trace: Vec<MacroFrame>,
}

impl DiagnosticMessage {
    pub fn new(severity: Severity, file: impl Into<String>, line: u32, message: impl Into<String>) -> Self {
        Self {
            severity,
            file: file.into(),
            line,
            ast_kind: None,
            message: message.into(),
            subject: None,
            macro_trace: Vec::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

impl fmt::Display for DiagnosticMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:1: {}: ", self.file, self.line, self.severity.as_str())?;
        if let Some(kind) = &self.ast_kind {
            write!(f, "in {} : ", kind)?;
        }
        write!(f, "{}", self.message)?;
        if let Some(subject) = &self.subject {
            write!(f, " ('{}')", subject)?;
        }
        // Outermost frame prints last, matching the order the expansion
        // stack is pushed in (§4.3 step 5: innermost frame pushed last,
        // so we print the trace in storage order to put outermost last).
        for frame in &self.macro_trace {
            write!(
                f,
                "\n -> in '{}!' at {}:{}",
                frame.macro_name, frame.file, frame.line
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_format_matches_wire_format() {
        let mut m = DiagnosticMessage::new(Severity::Error, "t.sql", 12, "undefined variable");
        m.ast_kind = Some("select_stmt".into());
        m.subject = Some("foo".into());
        assert_eq!(
            m.to_string(),
            "t.sql:12:1: error: in select_stmt : undefined variable ('foo')"
        );
    }

    #[test]
    fn macro_trace_appends_frames_outermost_last() {
        let mut m = DiagnosticMessage::new(Severity::Error, "t.sql", 5, "bad arity");
        m.macro_trace.push(MacroFrame {
            macro_name: "inner".into(),
            file: "t.sql".into(),
            line: 4,
        });
        m.macro_trace.push(MacroFrame {
            macro_name: "outer".into(),
            file: "t.sql".into(),
            line: 1,
        });
        let rendered = m.to_string();
        assert!(rendered.ends_with("-> in 'outer!' at t.sql:1"));
    }
}
