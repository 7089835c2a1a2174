//! Extension directives.
//!
//! Host code registers a [`Directive`] factory under a name; whenever the
//! parser meets `#name(...)` for a registered name it instantiates a fresh
//! directive, hands it the parsed parameter list and, for block directives,
//! the body up to the matching `#end`.

use std::fmt;

use indexmap::IndexMap;

use crate::{
    ast::{Expr, ExprList, Stat},
    error::RenderError,
    location::Location,
    value::Value,
};

/// A user-defined directive.
pub trait Directive: Send + Sync + fmt::Debug {
    /// Receive the parameter list. An error message rejects the directive at
    /// compile time.
    fn set_expr(&mut self, exprs: ExprList) -> Result<(), String>;

    /// Whether the directive takes a body terminated by `#end`.
    fn has_end(&self) -> bool {
        false
    }

    /// Receive the body of a block directive.
    fn set_body(&mut self, body: Stat) {
        let _ = body;
    }

    fn exec(&self, ctx: &mut dyn DirectiveContext) -> Result<(), RenderError>;
}

/// The interpreter surface available to a running [`Directive`].
pub trait DirectiveContext {
    /// Location of the directive being executed.
    fn location(&self) -> &Location;

    fn eval(&mut self, expr: &Expr) -> Result<Value, RenderError>;

    /// Execute a statement, typically the directive's body, in the current
    /// frame.
    fn exec(&mut self, stat: &Stat) -> Result<(), RenderError>;

    fn get(&self, name: &str) -> Option<Value>;

    /// Assign following the scope's lookup rules.
    fn set(&mut self, name: &str, value: Value);

    fn set_local(&mut self, name: &str, value: Value);

    fn push_frame(&mut self);

    fn pop_frame(&mut self);

    fn write_str(&mut self, s: &str) -> Result<(), RenderError>;

    /// Write a value the way `#(...)` would.
    fn write_value(&mut self, value: &Value) -> Result<(), RenderError>;
}

type Factory = Box<dyn Fn() -> Box<dyn Directive> + Send + Sync>;

/// Named directive factories.
#[derive(Default)]
pub struct DirectiveRegistry {
    factories: IndexMap<String, Factory>,
}

impl DirectiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `D` under `name`, instantiated with [`Default`].
    pub fn register<D>(&mut self, name: impl Into<String>) -> &mut Self
    where
        D: Directive + Default + 'static,
    {
        self.register_with(name, || Box::new(D::default()))
    }

    /// Register a factory closure under `name`.
    pub fn register_with<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Directive> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// A fresh directive instance for `name`.
    pub fn create(&self, name: &str) -> Option<Box<dyn Directive>> {
        self.factories.get(name).map(|factory| factory())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for DirectiveRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectiveRegistry")
            .field("names", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Noop {
        params: usize,
    }

    impl Directive for Noop {
        fn set_expr(&mut self, exprs: ExprList) -> Result<(), String> {
            self.params = exprs.len();
            Ok(())
        }

        fn exec(&self, _ctx: &mut dyn DirectiveContext) -> Result<(), RenderError> {
            Ok(())
        }
    }

    #[test]
    fn test_registry_creates_fresh_instances() {
        let mut registry = DirectiveRegistry::new();
        registry.register::<Noop>("noop");
        assert!(registry.contains("noop"));
        assert!(registry.create("missing").is_none());

        let mut first = registry.create("noop").unwrap();
        first.set_expr(ExprList::new(vec![Expr::Id("a".into())])).unwrap();
        let second = registry.create("noop").unwrap();
        assert!(format!("{first:?}").contains("params: 1"));
        assert!(format!("{second:?}").contains("params: 0"));
        assert!(!second.has_end());
    }

    #[test]
    fn test_registry_names_in_order() {
        let mut registry = DirectiveRegistry::new();
        registry
            .register::<Noop>("b")
            .register_with("a", || Box::new(Noop::default()));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["b", "a"]);
    }
}
