//! Tracing setup shared by every command

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Open `{dir}/{file_name}` for appending, creating the directory first
pub fn open_log_file(dir: &Path, file_name: &str) -> Result<File> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    let path = dir.join(file_name);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Filter directives: `-v` wins, then RUST_LOG, then LOG_LEVEL
pub fn filter_directives(level: &str, verbose: bool) -> String {
    if verbose {
        return "debug".to_string();
    }
    if let Ok(directives) = std::env::var("RUST_LOG")
        && !directives.trim().is_empty()
    {
        return directives;
    }
    format!("{},hyper=warn,reqwest=warn", level.trim().to_lowercase())
}

/// Install the global subscriber: stdout, plus a plain-text file when given
pub fn init(level: &str, verbose: bool, log_file: Option<File>) {
    let filter = EnvFilter::try_new(filter_directives(level, verbose))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = log_file.map(|file| {
        fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(Mutex::new(file))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();
}
