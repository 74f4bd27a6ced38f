//! Error types for the translator.
//!
//! A parse failure is always fatal: it carries the source file and line of
//! the offending construct and propagates with `?` straight to the binary,
//! which reports it and removes any partially-written output.

use thiserror::Error;

/// A structured parse/syntax failure.
///
/// Rendered exactly as `<file>:<line>: mjit error: <message>`, which is the
/// diagnostic contract of the command-line tool.
#[derive(Debug, Error)]
#[error("{file}:{line}: mjit error: {message}")]
pub struct SyntaxError {
    pub file: String,
    pub line: u32,
    pub message: String,
}

impl SyntaxError {
    pub fn new(file: impl Into<String>, line: u32, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            message: message.into(),
        }
    }
}

/// Any failure the translator can produce.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("mjit error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for translation operations.
pub type Result<T> = std::result::Result<T, Error>;
