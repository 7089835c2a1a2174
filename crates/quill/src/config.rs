//! Configuration types for the Quill engine.
//!
//! [`EngineConfig`] controls where templates are loaded from, whether
//! compiled templates are checked for changes, and how deep template
//! functions and includes may nest. It implements [`serde::Deserialize`] so
//! it can be loaded from TOML or any other serde format; every field has a
//! default.
//!
//! # Example
//!
//! ```
//! # use quill::config::EngineConfig;
//! let config = EngineConfig::default();
//! assert!(!config.dev_mode());
//! assert_eq!(config.max_call_depth(), Some(256));
//!
//! // Zero lifts a limit.
//! let config = EngineConfig::default().with_max_call_depth(0);
//! assert_eq!(config.max_call_depth(), None);
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

fn default_max_call_depth() -> usize {
    256
}

fn default_max_include_depth() -> usize {
    64
}

fn default_encoding() -> String {
    "UTF-8".to_string()
}

/// Engine settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Recompile templates whose sources changed since they were compiled.
    dev_mode: bool,

    /// Directory template names are resolved against.
    base_path: Option<PathBuf>,

    /// Maximum nesting of template function calls; `0` is unlimited.
    #[serde(default = "default_max_call_depth")]
    max_call_depth: usize,

    /// Maximum nesting of `#include`; `0` is unlimited.
    #[serde(default = "default_max_include_depth")]
    max_include_depth: usize,

    /// Declared template encoding. Only UTF-8 is supported.
    #[serde(default = "default_encoding")]
    encoding: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dev_mode: false,
            base_path: None,
            max_call_depth: default_max_call_depth(),
            max_include_depth: default_max_include_depth(),
            encoding: default_encoding(),
        }
    }
}

impl EngineConfig {
    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }

    pub fn with_base_path(mut self, base_path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    /// Whether templates are checked for changes on every lookup.
    pub fn dev_mode(&self) -> bool {
        self.dev_mode
    }

    pub fn base_path(&self) -> Option<&Path> {
        self.base_path.as_deref()
    }

    /// The call depth limit, or `None` when unlimited.
    pub fn max_call_depth(&self) -> Option<usize> {
        (self.max_call_depth > 0).then_some(self.max_call_depth)
    }

    /// The include depth limit, or `None` when unlimited.
    pub fn max_include_depth(&self) -> Option<usize> {
        (self.max_include_depth > 0).then_some(self.max_include_depth)
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// Check settings that cannot be expressed in the type.
    ///
    /// # Errors
    ///
    /// Returns a message when the encoding is not UTF-8.
    pub fn validate(&self) -> Result<(), String> {
        let normalized = self.encoding.to_ascii_lowercase().replace(['-', '_'], "");
        if normalized != "utf8" {
            return Err(format!(
                "unsupported template encoding `{}`, only UTF-8 is supported",
                self.encoding
            ));
        }
        Ok(())
    }
}
