//! Output formatting and logging setup for CLI commands

use crate::eval::EvaluationSummary;
use crate::{Error, Result};
use std::io::{self, Write};
use std::path::Path;

/// Send the log stream to `path`.
///
/// The level defaults to `debug`; `RUST_LOG` overrides it.
pub fn init_file_logging(path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init()
        .map_err(|e| Error::config(format!("cannot install logger: {}", e)))
}

/// Print a run summary as text or JSON.
pub fn print_summary(summary: &EvaluationSummary, json: bool) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(summary)?)?;
    } else {
        writeln!(out, "\n{}", summary)?;
    }
    out.flush()?;
    Ok(())
}
