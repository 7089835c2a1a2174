//! The ParseError type for wrapping compile diagnostics.
//!
//! [`ParseError`] wraps one or more [`Diagnostic`]s produced while compiling
//! a template, together with the name and text of the template they point
//! into. For errors inside an included template that is the included
//! template, not the one being compiled.

use std::{fmt, sync::Arc};

use quill_core::Location;

use crate::error::Diagnostic;

/// A type alias for `Result<T, Diagnostic>`.
pub type Result<T> = std::result::Result<T, Diagnostic>;

/// Error type for template compilation.
#[derive(Debug)]
pub struct ParseError {
    diagnostics: Vec<Diagnostic>,
    source: Option<(Arc<str>, Arc<str>)>,
}

impl ParseError {
    /// Create a new parse error from diagnostics.
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            diagnostics,
            source: None,
        }
    }

    /// Get all diagnostics in this error.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Set the location of every diagnostic that has none yet.
    pub fn with_location(mut self, location: &Location) -> Self {
        self.diagnostics = self
            .diagnostics
            .into_iter()
            .map(|diagnostic| diagnostic.with_location(location.clone()))
            .collect();
        self
    }

    /// Attach the template the diagnostics refer to, unless one is attached
    /// already.
    pub fn with_source(mut self, name: impl Into<Arc<str>>, text: impl Into<Arc<str>>) -> Self {
        if self.source.is_none() {
            self.source = Some((name.into(), text.into()));
        }
        self
    }

    /// Name of the template the diagnostics point into.
    pub fn source_name(&self) -> Option<&str> {
        self.source.as_ref().map(|(name, _)| &**name)
    }

    /// Text of the template the diagnostic spans index into.
    pub fn source_text(&self) -> Option<&str> {
        self.source.as_ref().map(|(_, text)| &**text)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(first) = self.diagnostics.first() {
            write!(f, "{}", first)?;
            if self.diagnostics.len() > 1 {
                write!(f, " (+{} more)", self.diagnostics.len() - 1)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

impl From<Diagnostic> for ParseError {
    fn from(diagnostic: Diagnostic) -> Self {
        Self::new(vec![diagnostic])
    }
}

impl From<Vec<Diagnostic>> for ParseError {
    fn from(diagnostics: Vec<Diagnostic>) -> Self {
        Self::new(diagnostics)
    }
}
