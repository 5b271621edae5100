//! Validate command: check probe files without a model

use clap::Parser;
use std::path::PathBuf;

use crate::eval::DatasetReport;
use crate::{Error, Result};

/// Check JSONL probe files without a model
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Files to check
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

/// Report on each file; fails if any file has malformed lines.
pub fn cmd_validate(args: ValidateArgs) -> Result<()> {
    let mut invalid = 0;
    for file in &args.files {
        let content = std::fs::read_to_string(file)
            .map_err(|e| Error::dataset(format!("Failed to read {}: {}", file.display(), e)))?;
        let report = DatasetReport::inspect(&content);
        println!("{}", file.display());
        print!("{}", report);
        if !report.is_valid() {
            invalid += 1;
        }
    }
    if invalid > 0 {
        return Err(Error::dataset(format!(
            "{} of {} files have malformed lines",
            invalid,
            args.files.len()
        )));
    }
    Ok(())
}
