//! Template sources.
//!
//! A [`Source`] yields template text, an optional cache key and a
//! modification check used by development mode. A [`SourceFactory`] maps a
//! template name to a source; the default one reads files relative to the
//! engine's base path.

use std::{
    collections::hash_map::DefaultHasher,
    fmt, fs,
    hash::{Hash, Hasher},
    io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError, RwLock},
    time::SystemTime,
};

use indexmap::IndexMap;
use log::debug;

/// Where template text comes from.
pub trait Source: Send + Sync + fmt::Debug {
    /// Name used in locations and error messages.
    fn name(&self) -> &str;

    /// Read the template text.
    fn content(&self) -> io::Result<String>;

    /// Key under which the compiled template may be cached. `None` disables
    /// caching.
    fn cache_key(&self) -> Option<String>;

    /// Whether the underlying text changed since it was last read.
    fn is_modified(&self) -> bool;
}

/// Resolves template names to sources.
pub trait SourceFactory: Send + Sync + fmt::Debug {
    fn source(&self, base_path: Option<&Path>, name: &str) -> io::Result<Arc<dyn Source>>;
}

/// Template text held in memory. Never modified.
#[derive(Debug, Clone)]
pub struct StringSource {
    name: String,
    content: String,
    cache_key: Option<String>,
}

impl StringSource {
    /// A source cached under a hash of its content.
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        Self {
            name: "<string>".to_string(),
            cache_key: Some(format!("string:{:016x}", hasher.finish())),
            content,
        }
    }

    /// A source that is compiled on every request.
    pub fn uncached(content: impl Into<String>) -> Self {
        Self {
            name: "<string>".to_string(),
            content: content.into(),
            cache_key: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Source for StringSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn content(&self) -> io::Result<String> {
        Ok(self.content.clone())
    }

    fn cache_key(&self) -> Option<String> {
        self.cache_key.clone()
    }

    fn is_modified(&self) -> bool {
        false
    }
}

/// A template file. Records the modification time seen at the last read.
#[derive(Debug)]
pub struct FileSource {
    name: String,
    path: PathBuf,
    last_modified: Mutex<Option<SystemTime>>,
}

impl FileSource {
    /// `name` resolved against `base_path`, or the working directory.
    pub fn new(base_path: Option<&Path>, name: &str) -> Self {
        let path = match base_path {
            Some(base) => base.join(name),
            None => PathBuf::from(name),
        };
        Self {
            name: name.to_string(),
            path,
            last_modified: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn modified_time(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }
}

impl Source for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn content(&self) -> io::Result<String> {
        let modified = self.modified_time();
        let content = fs::read_to_string(&self.path)?;
        *self
            .last_modified
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = modified;
        Ok(content)
    }

    fn cache_key(&self) -> Option<String> {
        Some(format!("file:{}", self.path.display()))
    }

    fn is_modified(&self) -> bool {
        let seen = *self
            .last_modified
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let modified = seen != self.modified_time();
        if modified {
            debug!(path = self.path.display().to_string(); "Template file modified");
        }
        modified
    }
}

/// The default factory: files under the base path.
#[derive(Debug, Default)]
pub struct FileSourceFactory;

impl SourceFactory for FileSourceFactory {
    fn source(&self, base_path: Option<&Path>, name: &str) -> io::Result<Arc<dyn Source>> {
        let source = FileSource::new(base_path, name);
        if !source.path().is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("template file not found: {}", source.path().display()),
            ));
        }
        Ok(Arc::new(source))
    }
}

type Templates = Arc<RwLock<IndexMap<String, (String, u64)>>>;

/// Named templates kept in memory, for embedding and tests.
///
/// Replacing a template through [`MemorySourceFactory::insert`] marks
/// sources handed out earlier as modified.
#[derive(Debug, Default, Clone)]
pub struct MemorySourceFactory {
    templates: Templates,
}

impl MemorySourceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the template `name`.
    pub fn insert(&self, name: impl Into<String>, content: impl Into<String>) -> &Self {
        let mut templates = self
            .templates
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let name = name.into();
        let version = templates.get(&name).map_or(0, |(_, version)| version + 1);
        templates.insert(name, (content.into(), version));
        self
    }
}

impl SourceFactory for MemorySourceFactory {
    fn source(&self, _base_path: Option<&Path>, name: &str) -> io::Result<Arc<dyn Source>> {
        let templates = self
            .templates
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if !templates.contains_key(name) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("template not found: {name}"),
            ));
        }
        Ok(Arc::new(MemorySource {
            name: name.to_string(),
            templates: Arc::clone(&self.templates),
            seen: Mutex::new(None),
        }))
    }
}

#[derive(Debug)]
struct MemorySource {
    name: String,
    templates: Templates,
    seen: Mutex<Option<u64>>,
}

impl MemorySource {
    fn current(&self) -> Option<(String, u64)> {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&self.name)
            .cloned()
    }
}

impl Source for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn content(&self) -> io::Result<String> {
        let (content, version) = self.current().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("template not found: {}", self.name),
            )
        })?;
        *self.seen.lock().unwrap_or_else(PoisonError::into_inner) = Some(version);
        Ok(content)
    }

    fn cache_key(&self) -> Option<String> {
        Some(format!("memory:{}", self.name))
    }

    fn is_modified(&self) -> bool {
        let seen = *self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        seen != self.current().map(|(_, version)| version)
    }
}

#[cfg(test)]
mod tests {
    use std::{fs::File, io::Write, time::Duration};

    use super::*;

    #[test]
    fn test_string_source_key_depends_on_content() {
        let a = StringSource::new("Hello #(name)!");
        let b = StringSource::new("Hello #(name)!");
        let c = StringSource::new("Bye");
        assert_eq!(a.cache_key(), b.cache_key());
        assert_ne!(a.cache_key(), c.cache_key());
        assert!(StringSource::uncached("x").cache_key().is_none());
        assert!(!a.is_modified());
    }

    #[test]
    fn test_file_source_detects_modification() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        fs::write(&path, "one").unwrap();

        let factory = FileSourceFactory;
        let source = factory.source(Some(dir.path()), "page.html").unwrap();
        assert_eq!(source.content().unwrap(), "one");
        assert!(!source.is_modified());

        let mut file = File::options().write(true).open(&path).unwrap();
        file.write_all(b"two").unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(5))
            .unwrap();
        assert!(source.is_modified());
        assert_eq!(source.content().unwrap(), "two");
        assert!(!source.is_modified());
    }

    #[test]
    fn test_file_factory_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileSourceFactory
            .source(Some(dir.path()), "nope.html")
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_memory_source_versions() {
        let factory = MemorySourceFactory::new();
        factory.insert("a", "first");
        let source = factory.source(None, "a").unwrap();
        assert_eq!(source.content().unwrap(), "first");
        assert!(!source.is_modified());

        factory.insert("a", "second");
        assert!(source.is_modified());
        assert_eq!(source.content().unwrap(), "second");
        assert!(factory.source(None, "b").is_err());
    }
}
