//! Render-time errors.
//!
//! Evaluation code produces a location-free [`RenderErrorKind`]; the
//! statement being executed wraps it into a [`RenderError`] carrying its
//! [`Location`]. Errors are propagated to the caller and never retried.
//!
//! Rendering writes to the sink incrementally, so output emitted before an
//! error stays in the sink. Callers that need all-or-nothing output should
//! render into a buffer first.

use std::io;

use thiserror::Error;

use crate::location::Location;

/// A type alias for results produced while evaluating expressions.
pub type EvalResult<T> = std::result::Result<T, RenderErrorKind>;

/// What went wrong while rendering, without location information.
#[derive(Debug, Error)]
pub enum RenderErrorKind {
    #[error("function `{0}` is not defined")]
    UndefinedFunction(String),

    #[error("function `{name}` expects {expected} argument(s) but {found} were given")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("the size of a {0} is unknown")]
    UncountableSize(&'static str),

    #[error("{0}")]
    Type(String),

    #[error("{0}")]
    Arithmetic(String),

    #[error("index {index} is out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("method `{name}` is not defined for {type_name}")]
    UndefinedMethod {
        name: String,
        type_name: &'static str,
    },

    #[error("field `{name}` is not defined for {type_name}")]
    UndefinedField {
        name: String,
        type_name: &'static str,
    },

    #[error("template function calls nested deeper than the limit of {0}")]
    CallDepthExceeded(usize),

    #[error("failed to write output: {0}")]
    Write(#[from] io::Error),

    #[error("{0}")]
    Directive(String),
}

impl RenderErrorKind {
    /// Shorthand for a [`RenderErrorKind::Type`] error.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Type(message.into())
    }

    /// Attach a location, producing a [`RenderError`].
    pub fn at(self, location: &Location) -> RenderError {
        RenderError::new(self, location.clone())
    }
}

/// A render-time failure together with the location of the statement that
/// raised it.
#[derive(Debug, Error)]
#[error("{location}: {kind}")]
pub struct RenderError {
    #[source]
    kind: RenderErrorKind,
    location: Location,
}

impl RenderError {
    /// Create a new render error.
    pub fn new(kind: RenderErrorKind, location: Location) -> Self {
        Self { kind, location }
    }

    /// The underlying cause.
    pub fn kind(&self) -> &RenderErrorKind {
        &self.kind
    }

    /// Where in the template the error occurred.
    pub fn location(&self) -> &Location {
        &self.location
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_error_display() {
        let err = RenderErrorKind::UndefinedFunction("header".to_string())
            .at(&Location::new("page.html", 4));
        assert_eq!(
            err.to_string(),
            "page.html:4: function `header` is not defined"
        );
    }

    #[test]
    fn test_render_error_source_is_kind() {
        use std::error::Error as _;

        let err = RenderErrorKind::CallDepthExceeded(8).at(&Location::new("a", 1));
        let source = err.source().expect("kind is exposed as source");
        assert!(source.to_string().contains("limit of 8"));
    }
}
