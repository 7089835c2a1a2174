//! The template engine: compilation, caching and shared state.
//!
//! An [`Engine`] resolves template names through its [`SourceFactory`],
//! compiles them with the parser and caches the result under the source's
//! cache key. In development mode every lookup checks whether the cached
//! template's sources changed and recompiles when they did.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use log::{debug, info};

use quill_core::{
    EvalResult, Value, Vars,
    directive::{Directive, DirectiveRegistry},
    source::{FileSourceFactory, Source, SourceFactory, StringSource},
};
use quill_parser::{ParseContext, parse};

use crate::{
    config::EngineConfig,
    env::FunctionTable,
    error::QuillError,
    methods::MethodRegistry,
    template::Template,
};

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Engine-wide functions registered with [`Engine::add_shared_function`].
#[derive(Debug, Default)]
struct SharedFunctions {
    /// Registered files, in registration order.
    roots: Vec<Arc<dyn Source>>,
    /// Every source read by the last rebuild.
    sources: Vec<Arc<dyn Source>>,
    table: Arc<FunctionTable>,
}

impl SharedFunctions {
    fn is_modified(&self) -> bool {
        self.sources.iter().any(|source| source.is_modified())
    }
}

/// State every template of an engine renders against.
#[derive(Debug)]
pub(crate) struct Runtime {
    pub(crate) config: EngineConfig,
    pub(crate) shared_vars: Vars,
    pub(crate) methods: MethodRegistry,
    shared_functions: RwLock<SharedFunctions>,
}

impl Runtime {
    pub(crate) fn new(config: EngineConfig, shared_vars: Vars, methods: MethodRegistry) -> Self {
        Self {
            config,
            shared_vars,
            methods,
            shared_functions: RwLock::default(),
        }
    }

    /// A snapshot of the shared function table.
    pub(crate) fn shared_functions(&self) -> Arc<FunctionTable> {
        Arc::clone(&read_lock(&self.shared_functions).table)
    }
}

/// Builder for [`Engine`].
///
/// # Example
///
/// ```
/// # use quill::{Engine, Value};
/// let engine = Engine::builder()
///     .shared_object("site", Value::str("Quill"))
///     .shared_method("twice", |args| {
///         Ok(Value::Int(args[0].as_int().unwrap_or(0) * 2))
///     })
///     .build()
///     .unwrap();
/// let template = engine.template_from_str("#(site): #(twice(21))").unwrap();
/// let out = template.render_to_string(quill::Vars::new()).unwrap();
/// assert_eq!(out, "Quill: 42");
/// ```
#[derive(Debug, Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    shared_vars: Vars,
    methods: MethodRegistry,
    directives: DirectiveRegistry,
    factory: Option<Box<dyn SourceFactory>>,
}

impl EngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn dev_mode(mut self, dev_mode: bool) -> Self {
        self.config = self.config.with_dev_mode(dev_mode);
        self
    }

    pub fn base_path(mut self, base_path: impl Into<PathBuf>) -> Self {
        self.config = self.config.with_base_path(base_path);
        self
    }

    /// Bind `name` for every template. Template data shadows it.
    pub fn shared_object(mut self, name: impl Into<String>, value: Value) -> Self {
        self.shared_vars.insert(name.into(), value);
        self
    }

    /// Register a free-standing function callable as `name(args)`.
    pub fn shared_method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&[Value]) -> EvalResult<Value> + Send + Sync + 'static,
    {
        self.methods.register_shared(name, method);
        self
    }

    /// Register a method callable as `value.name(args)` on any value.
    pub fn method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> EvalResult<Value> + Send + Sync + 'static,
    {
        self.methods.register(name, method);
        self
    }

    /// Register the extension directive `#name(...)`.
    pub fn directive<D>(mut self, name: impl Into<String>) -> Self
    where
        D: Directive + Default + 'static,
    {
        self.directives.register::<D>(name);
        self
    }

    pub fn directive_with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Directive> + Send + Sync + 'static,
    {
        self.directives.register_with(name, factory);
        self
    }

    /// Resolve template names through `factory` instead of the file system.
    pub fn source_factory(mut self, factory: impl SourceFactory + 'static) -> Self {
        self.factory = Some(Box::new(factory));
        self
    }

    /// # Errors
    ///
    /// Returns [`QuillError::Config`] for an invalid configuration.
    pub fn build(self) -> Result<Engine, QuillError> {
        self.config.validate().map_err(QuillError::Config)?;
        debug!(
            dev_mode = self.config.dev_mode(),
            directives = self.directives.names().count();
            "Building engine"
        );
        Ok(Engine {
            runtime: Arc::new(Runtime::new(self.config, self.shared_vars, self.methods)),
            factory: self.factory.unwrap_or_else(|| Box::new(FileSourceFactory)),
            directives: self.directives,
            cache: RwLock::default(),
        })
    }
}

/// A template engine.
///
/// `Engine` is `Send + Sync`; share it behind an [`Arc`] or a static and
/// look templates up from any thread.
#[derive(Debug)]
pub struct Engine {
    runtime: Arc<Runtime>,
    factory: Box<dyn SourceFactory>,
    directives: DirectiveRegistry,
    cache: RwLock<HashMap<String, Arc<Template>>>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// # Errors
    ///
    /// Returns [`QuillError::Config`] for an invalid configuration.
    pub fn new(config: EngineConfig) -> Result<Self, QuillError> {
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.runtime.config
    }

    /// Look up a template by name through the source factory.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::SourceNotFound`] when the factory has no such
    /// template and [`QuillError::Parse`] when it does not compile.
    pub fn template(&self, name: &str) -> Result<Arc<Template>, QuillError> {
        let source = self.lookup(name)?;
        self.template_from_source(source)
    }

    /// Compile template text, cached under a hash of the text.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::Parse`] when the text does not compile.
    pub fn template_from_str(&self, content: &str) -> Result<Arc<Template>, QuillError> {
        self.template_from_source(Arc::new(StringSource::new(content)))
    }

    /// Compile a template from any source. Sources without a cache key are
    /// compiled on every call.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::Parse`] when the source does not compile.
    pub fn template_from_source(
        &self,
        source: Arc<dyn Source>,
    ) -> Result<Arc<Template>, QuillError> {
        let dev_mode = self.runtime.config.dev_mode();
        if dev_mode {
            self.refresh_shared_functions()?;
        }

        let Some(key) = source.cache_key() else {
            return self.compile(source).map(Arc::new);
        };

        if let Some(cached) = read_lock(&self.cache).get(&key) {
            if !dev_mode || !cached.is_modified() {
                debug!(key = key.as_str(); "Template cache hit");
                return Ok(Arc::clone(cached));
            }
            info!(template = cached.name(); "Template changed, recompiling");
        } else {
            debug!(key = key.as_str(); "Template cache miss");
        }

        let template = Arc::new(self.compile(source)?);
        let mut cache = write_lock(&self.cache);
        if let Some(existing) = cache.get(&key) {
            // Another thread compiled the same key meanwhile.
            if !dev_mode || !existing.is_modified() {
                return Ok(Arc::clone(existing));
            }
        }
        cache.insert(key, Arc::clone(&template));
        Ok(template)
    }

    /// Register the `#define`s of the template `name` for every template.
    ///
    /// The whole shared table is rebuilt; on error it is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::DuplicateFunction`] when two shared files define
    /// the same function, or any lookup and compile error.
    pub fn add_shared_function(&self, name: &str) -> Result<(), QuillError> {
        let source = self.lookup(name)?;
        self.add_shared_function_source(source)
    }

    /// Like [`Engine::add_shared_function`] for an arbitrary source.
    ///
    /// # Errors
    ///
    /// See [`Engine::add_shared_function`].
    pub fn add_shared_function_source(&self, source: Arc<dyn Source>) -> Result<(), QuillError> {
        let mut shared = write_lock(&self.runtime.shared_functions);
        shared.roots.push(source);
        if let Err(err) = self.rebuild_shared(&mut shared) {
            shared.roots.pop();
            return Err(err);
        }
        Ok(())
    }

    /// Names of all shared functions.
    pub fn shared_function_names(&self) -> Vec<String> {
        self.runtime
            .shared_functions()
            .names()
            .map(str::to_string)
            .collect()
    }

    /// Drop the cached template stored under `key`.
    pub fn remove_template_cache(&self, key: &str) -> Option<Arc<Template>> {
        write_lock(&self.cache).remove(key)
    }

    pub fn clear_template_cache(&self) {
        write_lock(&self.cache).clear();
    }

    /// Number of cached templates.
    pub fn cached_template_count(&self) -> usize {
        read_lock(&self.cache).len()
    }

    fn lookup(&self, name: &str) -> Result<Arc<dyn Source>, QuillError> {
        self.factory
            .source(self.runtime.config.base_path(), name)
            .map_err(|err| QuillError::from_lookup(name, err))
    }

    fn parse_context(&self) -> ParseContext<'_> {
        ParseContext {
            directives: &self.directives,
            factory: self.factory.as_ref(),
            base_path: self.runtime.config.base_path(),
            max_include_depth: self.runtime.config.max_include_depth(),
        }
    }

    fn compile(&self, source: Arc<dyn Source>) -> Result<Template, QuillError> {
        let name = source.name().to_string();
        let parsed = parse(source, &self.parse_context()).map_err(QuillError::new_parse_error)?;
        info!(
            template = name.as_str(),
            functions = parsed.defines.len(),
            includes = parsed.sources.len().saturating_sub(1);
            "Compiled template"
        );
        Ok(Template::new(name, parsed, Arc::clone(&self.runtime)))
    }

    /// Rebuild shared functions when any of their sources changed.
    fn refresh_shared_functions(&self) -> Result<(), QuillError> {
        if !read_lock(&self.runtime.shared_functions).is_modified() {
            return Ok(());
        }
        let mut shared = write_lock(&self.runtime.shared_functions);
        if shared.is_modified() {
            info!(files = shared.roots.len(); "Shared function sources changed, rebuilding");
            self.rebuild_shared(&mut shared)?;
        }
        Ok(())
    }

    fn rebuild_shared(&self, shared: &mut SharedFunctions) -> Result<(), QuillError> {
        let ctx = self.parse_context();
        let mut table = FunctionTable::new();
        let mut sources = Vec::new();
        for root in &shared.roots {
            let parsed = parse(Arc::clone(root), &ctx).map_err(QuillError::new_parse_error)?;
            for define in parsed.defines {
                if let Err(define) = table.insert(define) {
                    let Some(first) = table.get(&define.name) else {
                        continue;
                    };
                    // Two shared files including the same library.
                    if first.location == define.location {
                        continue;
                    }
                    return Err(QuillError::DuplicateFunction {
                        name: define.name,
                        first: first.location.template().to_string(),
                        second: define.location.template().to_string(),
                    });
                }
            }
            sources.extend(parsed.sources);
        }
        info!(functions = table.names().count(), files = shared.roots.len(); "Rebuilt shared functions");
        shared.table = Arc::new(table);
        shared.sources = sources;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use quill_core::source::MemorySourceFactory;

    use super::*;

    #[test]
    fn test_engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
        assert_send_sync::<Template>();
    }

    #[test]
    fn test_missing_template_is_reported_by_name() {
        let engine = Engine::builder()
            .source_factory(MemorySourceFactory::new())
            .build()
            .unwrap();
        assert!(matches!(
            engine.template("nope.html"),
            Err(QuillError::SourceNotFound(name)) if name == "nope.html"
        ));
    }

    #[test]
    fn test_invalid_encoding_is_rejected() {
        let config = EngineConfig::default().with_encoding("latin1");
        assert!(matches!(Engine::new(config), Err(QuillError::Config(_))));
    }

    #[test]
    fn test_uncached_sources_compile_every_time() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let first = engine
            .template_from_source(Arc::new(StringSource::uncached("x")))
            .unwrap();
        let second = engine
            .template_from_source(Arc::new(StringSource::uncached("x")))
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(engine.cached_template_count(), 0);
    }

    #[test]
    fn test_failed_shared_registration_leaves_table_unchanged() {
        let files = MemorySourceFactory::new();
        files.insert("a.html", "#define f()a#end");
        files.insert("b.html", "#define f()b#end");
        let engine = Engine::builder().source_factory(files).build().unwrap();

        engine.add_shared_function("a.html").unwrap();
        assert!(matches!(
            engine.add_shared_function("b.html"),
            Err(QuillError::DuplicateFunction { name, .. }) if name == "f"
        ));
        assert_eq!(engine.shared_function_names(), vec!["f"]);
    }
}
