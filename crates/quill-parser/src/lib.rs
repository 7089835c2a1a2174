//! # Quill Parser
//!
//! Compiler front end for the Quill template language. This crate turns
//! template text into the [`quill_core::ast`] trees the engine executes.
//!
//! ## Usage
//!
//! ```
//! # use quill_core::{directive::DirectiveRegistry, source::{FileSourceFactory, StringSource}};
//! # use quill_parser::{ParseContext, ParseError, parse};
//! # use std::sync::Arc;
//!
//! fn main() -> Result<(), ParseError> {
//!     let directives = DirectiveRegistry::new();
//!     let ctx = ParseContext {
//!         directives: &directives,
//!         factory: &FileSourceFactory,
//!         base_path: None,
//!         max_include_depth: Some(64),
//!     };
//!     let source = StringSource::new("#for(x : [1..3])#(x)#end");
//!     let template = parse(Arc::new(source), &ctx)?;
//!     assert!(template.defines.is_empty());
//!     Ok(())
//! }
//! ```
//!
//! The pipeline has three stages:
//!
//! 1. **Lex** - split the template into text runs, directive markers and raw
//!    parameter lists
//! 2. **Parse statements** - build the statement tree, hoist `#define`s and
//!    compile `#include`s in place
//! 3. **Parse expressions** - tokenize and parse each parameter list on
//!    demand

pub mod error;
mod expr_lexer;
mod expr_parser;
mod lexer;
mod parser;
mod span;
mod tokens;

pub use error::{Diagnostic, ErrorCode, ParseError};
pub use expr_parser::parse_expr_list;
pub use parser::{ParseContext, ParsedTemplate, parse};
pub use span::Span;
