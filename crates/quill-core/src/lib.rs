//! Quill Core Types and Definitions
//!
//! This crate provides the runtime types shared by the Quill parser and
//! engine. It includes:
//!
//! - **Values**: The dynamic value model ([`value::Value`])
//! - **AST**: Compiled statement and expression trees ([`ast`] module)
//! - **Scopes**: Frame stacks and control state ([`scope::Scope`])
//! - **Iteration**: Loop adapters and loop status ([`iter`] module)
//! - **Output**: Render destinations ([`output::Output`])
//! - **Sources**: Where template text comes from ([`source`] module)
//! - **Directives**: The extension directive seam ([`directive::Directive`])

pub mod ast;
pub mod directive;
pub mod error;
pub mod iter;
pub mod location;
pub mod ops;
pub mod output;
pub mod scope;
pub mod source;
pub mod value;

pub use error::{EvalResult, RenderError, RenderErrorKind};
pub use location::Location;
pub use value::{Value, Vars};
