//! Quill CLI entry point.

use std::{process, str::FromStr};

use clap::Parser;
use log::{LevelFilter, debug, error, info};

use quill::QuillError;
use quill_cli::{Args, error_adapter::to_reportables};

fn main() {
    miette::set_panic_hook();

    let args = Args::parse();

    let log_level = LevelFilter::from_str(&args.log_level).unwrap_or_else(|_| {
        eprintln!("Invalid log level: {}. Using 'warn' instead.", args.log_level);
        LevelFilter::Warn
    });
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(log_level)
        .init();

    info!(log_level:?; "Starting Quill");
    debug!(args:?; "Parsed arguments");

    if let Err(err) = quill_cli::run(&args) {
        report(&err);
        process::exit(1);
    }

    info!("Completed successfully");
}

/// Log every diagnostic of `err` as its own miette report.
fn report(err: &QuillError) {
    let reporter = miette::GraphicalReportHandler::new();
    for reportable in to_reportables(err) {
        let mut rendered = String::new();
        if reporter.render_report(&mut rendered, &reportable).is_err() {
            rendered = reportable.to_string();
        }
        error!("{rendered}");
    }
}
