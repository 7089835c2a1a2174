//! Quill - a directive-based template engine.
//!
//! Templates mix plain text with `#directive(...)` markers and `#(expr)`
//! output. They are compiled once into a statement tree, cached by the
//! [`Engine`], and rendered any number of times against a map of variables.
//!
//! # Examples
//!
//! ```rust
//! use quill::{Engine, Value, Vars};
//!
//! let engine = Engine::builder().build().expect("valid config");
//! let template = engine
//!     .template_from_str("#for(x : items)#(x)#if(!for.last), #end#end")
//!     .expect("Failed to compile");
//!
//! let mut data = Vars::new();
//! data.insert("items".to_string(), Value::list([1.into(), 2.into(), 3.into()]));
//! assert_eq!(template.render_to_string(data).unwrap(), "1, 2, 3");
//! ```
//!
//! # Directives
//!
//! - `#(expr)` writes a value; null writes nothing
//! - `#if(c) ... #elseif(c) ... #else ... #end`
//! - `#for(x : items) ... #else ... #end` and `#for(i = 0; i < n; i++) ... #end`,
//!   with the loop status bound as `for`
//! - `#switch(v) #case(a, b) ... #default ... #end` without fallthrough
//! - `#define name(a, b) ... #end` and `#@name(1, 2)`, `#@name?()`,
//!   `#call("name", ...)`
//! - `#include("file", var = value)`, compiled in place
//! - `#set`, `#setLocal`, `#setGlobal`
//! - `#break`, `#continue`, `#return`
//! - `#[[ raw text ]]#`, `### line comment`, `#-- block comment --#`
//!
//! # Assignment scoping
//!
//! A plain `#set(x = 1)` writes to the innermost frame that already binds
//! `x`. When no frame binds it, the variable is created in the root frame,
//! so an undeclared assignment inside a loop or function stays visible after
//! it. Use `#setLocal` to confine a variable to the current frame and
//! `#setGlobal` to always write the root frame.

pub mod config;

mod engine;
mod env;
mod error;
mod interp;
mod methods;
mod template;

pub use quill_core::{
    EvalResult, Location, RenderError, RenderErrorKind, Value, Vars, ast, directive, output,
    source, value,
};
pub use quill_parser::{Diagnostic, ErrorCode, ParseError};

pub use engine::{Engine, EngineBuilder};
pub use env::{Env, FunctionTable};
pub use error::QuillError;
pub use methods::{MethodFn, MethodRegistry, SharedMethodFn};
pub use template::Template;
