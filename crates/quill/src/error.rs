//! Error types for Quill operations.
//!
//! This module provides the main error type [`QuillError`] which wraps
//! the failures that can occur while loading, compiling and rendering
//! templates.

use std::io;

use thiserror::Error;

use quill_core::RenderError;
use quill_parser::ParseError;

/// The main error type for Quill operations.
///
/// # Diagnostic Variants
///
/// The `Parse` variant carries the structured compile diagnostics together
/// with the text of the template they point into, which is enough for rich
/// error reporting.
#[derive(Debug, Error)]
pub enum QuillError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{err}")]
    Parse { err: ParseError, src: String },

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("template not found: {0}")]
    SourceNotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("shared function `{name}` is defined in both `{first}` and `{second}`")]
    DuplicateFunction {
        name: String,
        first: String,
        second: String,
    },
}

impl QuillError {
    /// Create a new `Parse` error, keeping the text of the template the
    /// diagnostics refer to.
    pub fn new_parse_error(err: ParseError) -> Self {
        let src = err.source_text().unwrap_or_default().to_string();
        Self::Parse { err, src }
    }

    /// Map a source lookup failure, reporting missing templates by name.
    pub(crate) fn from_lookup(name: &str, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            Self::SourceNotFound(name.to_string())
        } else {
            Self::Io(err)
        }
    }
}
