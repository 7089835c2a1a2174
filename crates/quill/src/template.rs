//! Compiled templates and the render entry points.

use std::{io, sync::Arc};

use log::debug;

use quill_core::{
    RenderError, RenderErrorKind, Value, Vars,
    ast::Stat,
    output::{ByteOutput, CharOutput, Output},
};
use quill_parser::ParsedTemplate;

use crate::{
    engine::Runtime,
    env::{Env, FunctionTable},
    interp::Interpreter,
};

/// A compiled template, shared between threads through an [`Arc`].
///
/// A template is immutable once compiled. Each render builds its own scope,
/// so one template can be rendered concurrently from many threads.
///
/// # Partial output
///
/// Rendering writes as it goes. When a render fails, whatever was written
/// before the failing statement has already reached the output.
#[derive(Debug)]
pub struct Template {
    name: String,
    body: Stat,
    env: Env,
    runtime: Arc<Runtime>,
}

impl Template {
    pub(crate) fn new(name: String, parsed: ParsedTemplate, runtime: Arc<Runtime>) -> Self {
        let ParsedTemplate {
            body,
            defines,
            sources,
        } = parsed;
        Self {
            name,
            body,
            env: Env::new(defines.into_iter().collect::<FunctionTable>(), sources),
            runtime,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Functions and sources the template was compiled with.
    pub fn env(&self) -> &Env {
        &self.env
    }

    /// Whether any source of the template changed since compilation.
    pub fn is_modified(&self) -> bool {
        self.env.is_modified()
    }

    /// Render into `out` with `data` bound in the root frame.
    ///
    /// # Errors
    ///
    /// Returns the first render error, located at the statement that raised
    /// it. Output written before the error stays in `out`.
    pub fn render<K, I>(&self, data: I, out: &mut dyn Output) -> Result<(), RenderError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let root: Vars = data.into_iter().map(|(k, v)| (k.into(), v)).collect();
        let shared_functions = self.runtime.shared_functions();
        let location = self.body.location().clone();
        debug!(template = self.name.as_str(), vars = root.len(); "Rendering template");

        {
            let mut interp = Interpreter::new(
                root,
                &self.runtime,
                self.env.functions(),
                &shared_functions,
                out,
                location.clone(),
            );
            interp.exec(&self.body)?;
        }
        out.flush()
            .map_err(|err| RenderErrorKind::from(err).at(&location))
    }

    /// Render into a new `String`.
    ///
    /// # Errors
    ///
    /// See [`Template::render`]. The partial output is discarded.
    pub fn render_to_string<K, I>(&self, data: I) -> Result<String, RenderError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let mut out = CharOutput::new(String::new());
        self.render(data, &mut out)?;
        out.into_inner()
            .map_err(|err| RenderErrorKind::from(err).at(self.body.location()))
    }

    /// Render as UTF-8 bytes into `writer`.
    ///
    /// # Errors
    ///
    /// See [`Template::render`]. Bytes already handed to `writer` stay
    /// there.
    pub fn render_to_writer<K, I, W>(&self, data: I, writer: W) -> Result<(), RenderError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
        W: io::Write,
    {
        let mut out = ByteOutput::new(writer);
        self.render(data, &mut out)?;
        out.into_inner()
            .map(drop)
            .map_err(|err| RenderErrorKind::from(err).at(self.body.location()))
    }
}
