//! Suite command: probe every relation of a relations file

use clap::Parser;
use std::io::Write;
use std::path::PathBuf;

use super::super::output::init_file_logging;
use super::super::parser::ProbeArgs;
use crate::backends::create_model;
use crate::eval::rundir::LOG_FILE;
use crate::eval::{load_relations, run_suite, LogProbRanker};
use crate::Result;

/// Probe every relation of a relations file
#[derive(Parser, Debug)]
pub struct SuiteArgs {
    /// JSONL file of {relation, template, template_negated?, dataset}
    #[arg(short, long, value_name = "PATH")]
    pub relations: PathBuf,

    /// Shared probing options
    #[command(flatten)]
    pub probe: ProbeArgs,
}

/// Run every relation and print the per-relation table.
pub fn cmd_suite(args: SuiteArgs) -> Result<()> {
    let base = args.probe.to_config();
    // templates come per relation, so only the model choice is checked here
    let selector = base.model_selector()?;
    let relations = load_relations(&args.relations)?;

    let model = create_model(selector, &base)?;
    std::fs::create_dir_all(&base.logdir)?;
    init_file_logging(&base.logdir.join(LOG_FILE))?;

    let report = run_suite(&base, &relations, model.as_ref(), &LogProbRanker)?;
    let mut out = std::io::stdout().lock();
    if args.probe.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        writeln!(out, "{}", report)?;
    }
    Ok(())
}
