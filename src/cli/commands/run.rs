//! Run command: probe one dataset

use clap::Parser;
use std::path::PathBuf;

use super::super::output::{init_file_logging, print_summary};
use super::super::parser::ProbeArgs;
use crate::backends::create_model;
use crate::eval::rundir::LOG_FILE;
use crate::eval::{prepare_run_dir, run_evaluation, write_args, LogProbRanker, ProbeConfig};
use crate::Result;

/// Probe one dataset
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// JSONL probe file
    #[arg(short, long, value_name = "PATH")]
    pub dataset: PathBuf,

    /// Template with [X] and [Y] placeholders
    #[arg(long)]
    pub template: Option<String>,

    /// Negated template
    #[arg(long)]
    pub template_negated: Option<String>,

    /// Explicit run directory (overrides --logdir)
    #[arg(long, value_name = "DIR")]
    pub full_logdir: Option<PathBuf>,

    /// Shared probing options
    #[command(flatten)]
    pub probe: ProbeArgs,
}

impl RunArgs {
    /// Full run configuration.
    pub fn to_config(&self) -> ProbeConfig {
        ProbeConfig {
            dataset: self.dataset.clone(),
            template: self.template.clone(),
            template_negated: self.template_negated.clone(),
            full_logdir: self.full_logdir.clone(),
            ..self.probe.to_config()
        }
    }
}

/// Run one evaluation and print its summary.
pub fn cmd_run(args: RunArgs) -> Result<()> {
    let config = args.to_config();
    config.validate()?;

    let model = create_model(config.model_selector()?, &config)?;
    let dir = prepare_run_dir(&config, &model.run_name())?;
    init_file_logging(&dir.join(LOG_FILE))?;
    write_args(&dir, &config)?;

    let run = run_evaluation(&config, model.as_ref(), &LogProbRanker)?;
    eprintln!(
        "{} probes, {} excluded, {} batches",
        run.filter.total,
        run.filter.excluded(),
        run.batches
    );
    if let Some(report) = &run.materialize {
        eprintln!("{}", report);
    }
    print_summary(&run.summary, args.probe.json)?;
    eprintln!("run directory: {}", dir.display());
    Ok(())
}
