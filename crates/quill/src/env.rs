//! Template function registries.
//!
//! Every compiled template owns an [`Env`]: the functions it and its
//! includes define, and the sources it was built from. The engine keeps one
//! more [`FunctionTable`] of shared functions visible to every template.

use std::sync::Arc;

use indexmap::IndexMap;

use quill_core::{ast::Define, source::Source};

/// Functions by name, in definition order.
#[derive(Debug, Default)]
pub struct FunctionTable {
    functions: IndexMap<String, Define>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a function. A function with the same name is handed back.
    pub fn insert(&mut self, define: Define) -> Result<(), Define> {
        if self.functions.contains_key(&define.name) {
            return Err(define);
        }
        self.functions.insert(define.name.clone(), define);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Define> {
        self.functions.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

impl FromIterator<Define> for FunctionTable {
    /// Collect definitions; a later definition of a name is dropped.
    fn from_iter<I: IntoIterator<Item = Define>>(iter: I) -> Self {
        let mut table = Self::new();
        for define in iter {
            let _ = table.insert(define);
        }
        table
    }
}

/// The compile-time environment of one template.
#[derive(Debug)]
pub struct Env {
    functions: FunctionTable,
    sources: Vec<Arc<dyn Source>>,
}

impl Env {
    pub fn new(functions: FunctionTable, sources: Vec<Arc<dyn Source>>) -> Self {
        Self { functions, sources }
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    /// The template's own source followed by everything it includes.
    pub fn sources(&self) -> &[Arc<dyn Source>] {
        &self.sources
    }

    /// Whether any source the template was built from changed.
    pub fn is_modified(&self) -> bool {
        self.sources.iter().any(|source| source.is_modified())
    }
}
