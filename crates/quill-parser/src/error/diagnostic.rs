//! The core diagnostic type for the Quill error system.
//!
//! A [`Diagnostic`] represents a single compile error with an optional
//! error code, multiple labeled source spans, help text and the template
//! location it refers to.

use std::fmt;

use quill_core::Location;

use crate::{
    error::{error_code::ErrorCode, label::Label},
    span::Span,
};

/// A rich diagnostic message with source location information.
///
/// Diagnostics provide detailed information about compile errors,
/// including:
/// - An optional error code for documentation and searchability
/// - A primary message describing the issue
/// - One or more labeled source spans
/// - Optional help text with suggestions
/// - The template and row of the offending directive
///
/// # Example
///
/// ```text
/// error[E202]: `#for` is missing its `#end`
///   --> list.html:3
///    |
///  3 | #for(item : items)
///    | ^^^^^^^^^^^^^^^^^^ block opened here
///    |
///    = help: close the block with `#end`
/// ```
#[derive(Debug, Clone)]
pub struct Diagnostic {
    code: Option<ErrorCode>,
    message: String,
    labels: Vec<Label>,
    help: Option<String>,
    location: Option<Location>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    ///
    /// # Example
    ///
    /// ```
    /// # use quill_parser::error::{Diagnostic, ErrorCode};
    /// # use quill_parser::Span;
    ///
    /// let span = Span::new(0..10);
    /// let diag = Diagnostic::error("unknown directive `#widget`")
    ///     .with_code(ErrorCode::E200)
    ///     .with_label(span, "not registered")
    ///     .with_help("register the directive on the engine builder");
    /// ```
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            labels: Vec::new(),
            help: None,
            location: None,
        }
    }

    /// Get the error code, if any.
    pub fn code(&self) -> Option<ErrorCode> {
        self.code
    }

    /// Get the primary message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get all labels attached to this diagnostic.
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Get the help text, if any.
    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    /// Get the template location, if known.
    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    /// Set the error code.
    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Add a primary label to this diagnostic.
    pub fn with_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(Label::primary(span, message));
        self
    }

    /// Add a secondary label to this diagnostic.
    pub fn with_secondary_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(Label::secondary(span, message));
        self
    }

    /// Set the help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Set the template location. An existing location is kept.
    pub fn with_location(mut self, location: Location) -> Self {
        self.location.get_or_insert(location);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Format: "error[E001]: message (page.html:3)" or "error: message"
        f.write_str("error")?;
        if let Some(code) = self.code {
            write!(f, "[{}]", code)?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(location) = &self.location {
            write!(f, " ({location})")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}
