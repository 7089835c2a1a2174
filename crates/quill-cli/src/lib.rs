//! CLI logic for the Quill template renderer.
//!
//! This module contains the core CLI logic: it loads the configuration,
//! builds an [`Engine`] rooted at the template's directory, and renders the
//! template against variables read from a TOML data file.

pub mod error_adapter;

mod args;
mod config;
mod data;

pub use args::Args;
pub use data::load_data;

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use log::{debug, info};

use quill::{
    Engine, QuillError, Vars,
    source::{FileSourceFactory, SourceFactory},
};

/// Run the Quill CLI application
///
/// The template named by `args.input` is looked up relative to its own
/// directory, so includes resolve next to it unless the configuration sets
/// a base path.
///
/// # Arguments
///
/// * `args` - Command-line arguments
///
/// # Errors
///
/// Returns `QuillError` for:
/// - File I/O errors
/// - Configuration loading errors
/// - Compile errors in the template or its includes
/// - Render errors
pub fn run(args: &Args) -> Result<(), QuillError> {
    info!(
        input_path = args.input,
        output_path:? = args.output;
        "Rendering template"
    );

    let mut config = config::load_config(args.config.as_ref())?;

    let input = Path::new(&args.input);
    let name = input
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| QuillError::SourceNotFound(args.input.clone()))?;
    if config.base_path().is_none() {
        let parent = input.parent().unwrap_or_else(|| Path::new(""));
        config = config.with_base_path(parent);
    }

    let engine = Engine::new(config)?;
    for path in &args.shared {
        let source = FileSourceFactory
            .source(None, path)
            .map_err(|_| QuillError::SourceNotFound(path.clone()))?;
        engine.add_shared_function_source(source)?;
    }
    debug!(functions:? = engine.shared_function_names(); "Shared functions registered");

    let data = match &args.data {
        Some(path) => load_data(path)?,
        None => Vars::new(),
    };

    let template = engine.template(name)?;
    match &args.output {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            template.render_to_writer(data, &mut writer)?;
            writer.flush()?;
            info!(output_file = path; "Template rendered successfully");
        }
        None => {
            let mut writer = BufWriter::new(io::stdout().lock());
            template.render_to_writer(data, &mut writer)?;
            writer.flush()?;
        }
    }

    Ok(())
}
