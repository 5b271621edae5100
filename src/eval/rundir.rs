//! Run directories and the configuration snapshot.
//!
//! Every run writes into its own directory: `full_logdir` when set, else
//! `<logdir>/<RunName>_<YYYYmmdd_HHMMSS>/`. On Unix `<logdir>/last` is a
//! symlink to the newest timestamped directory. Runs started within the
//! same second get a `_1`, `_2`, ... suffix.

use super::config::ProbeConfig;
use crate::Result;
use std::path::{Path, PathBuf};

/// File the configuration is dumped to.
pub const ARGS_FILE: &str = "args.json";

/// File the log stream goes to.
pub const LOG_FILE: &str = "info.log";

/// Name of the timestamped directory for `run_name` at the current local time.
#[must_use]
pub fn timestamped_name(run_name: &str) -> String {
    format!(
        "{}_{}",
        run_name,
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    )
}

/// Create the run directory for `config` and return its path.
pub fn prepare_run_dir(config: &ProbeConfig, run_name: &str) -> Result<PathBuf> {
    if let Some(dir) = &config.full_logdir {
        std::fs::create_dir_all(dir)?;
        return Ok(dir.clone());
    }

    std::fs::create_dir_all(&config.logdir)?;
    let dir = create_fresh_dir(&config.logdir, &timestamped_name(run_name))?;
    link_last(&config.logdir, &dir);
    Ok(dir)
}

/// Create `<parent>/<name>`, or the first free `<name>_<n>` when it exists.
fn create_fresh_dir(parent: &Path, name: &str) -> Result<PathBuf> {
    let mut suffix = 0usize;
    loop {
        let dir = if suffix == 0 {
            parent.join(name)
        } else {
            parent.join(format!("{}_{}", name, suffix))
        };
        match std::fs::create_dir(&dir) {
            Ok(()) => return Ok(dir),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => suffix += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn link_last(logdir: &Path, dir: &Path) {
    let link = logdir.join("last");
    if link.symlink_metadata().is_ok() {
        if let Err(e) = std::fs::remove_file(&link) {
            log::warn!("cannot replace {}: {}", link.display(), e);
            return;
        }
    }
    let target = dir.file_name().map(PathBuf::from).unwrap_or_else(|| dir.to_path_buf());
    if let Err(e) = std::os::unix::fs::symlink(&target, &link) {
        log::warn!("cannot link {}: {}", link.display(), e);
    }
}

#[cfg(not(unix))]
fn link_last(_logdir: &Path, _dir: &Path) {}

/// Write `config` to `<dir>/args.json`.
pub fn write_args(dir: &Path, config: &ProbeConfig) -> Result<PathBuf> {
    let path = dir.join(ARGS_FILE);
    std::fs::write(&path, serde_json::to_string_pretty(config)?)?;
    Ok(path)
}
