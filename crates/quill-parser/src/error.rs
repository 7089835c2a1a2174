//! Error and diagnostic system for the Quill parser.
//!
//! Compile errors are reported as [`Diagnostic`]s: an [`ErrorCode`], a message, labelled spans into the template text, optional
//! help and the [`Location`](quill_core::Location) of the offending
//! directive. One or more diagnostics travel together as a [`ParseError`].
//!
//! # Example
//!
//! ```
//! # use quill_parser::error::{Diagnostic, ErrorCode};
//! # use quill_parser::Span;
//! # use quill_core::Location;
//!
//! let diag = Diagnostic::error("`#if` is missing its `#end`")
//!     .with_code(ErrorCode::E202)
//!     .with_label(Span::new(40..40), "template ends here")
//!     .with_secondary_label(Span::new(0..9), "block opened here")
//!     .with_location(Location::new("page.html", 1))
//!     .with_help("close the block with `#end`");
//! ```

mod collector;
mod diagnostic;
mod error_code;
mod label;
mod parse_error;

pub(crate) use collector::DiagnosticCollector;
pub(crate) use parse_error::Result;

pub use diagnostic::Diagnostic;
pub use error_code::ErrorCode;
pub use label::Label;
pub use parse_error::ParseError;
