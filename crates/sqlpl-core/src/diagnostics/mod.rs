//! Diagnostics infrastructure shared by every pass (parser, macro
//! expander, semantic analyzer).
//!
//! Two rendering paths exist: `Display`/`DiagnosticsPrinter::render_plain`
//! reproduces the exact wire format in §6.3 byte-for-byte (a testable
//! property of this spec), and `DiagnosticsPrinter::render_pretty` uses
//! `annotate-snippets` for a human-friendly multi-line view when source
//! text is available. The plain format is authoritative; the pretty one
//! is a convenience and must never replace it.

mod collection;
mod message;
mod printer;

#[cfg(test)]
mod tests;

pub use collection::Diagnostics;
pub use message::{MacroFrame, Severity};
pub use printer::DiagnosticsPrinter;

use message::DiagnosticMessage;
