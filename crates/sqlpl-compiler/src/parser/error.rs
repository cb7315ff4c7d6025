//! Parse errors. Fatal per §7: a parse error aborts the pipeline before
//! macro expansion or semantic analysis ever run.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
#[error("{file}:{line}:1: error: {message}")]
pub struct ParseError {
    pub file: String,
    pub line: u32,
    pub message: String,
}
