//! factprobe - factual knowledge probing CLI
//!
//! # Usage
//!
//! ```bash
//! # Probe one relation with a template
//! factprobe run --dataset P19.jsonl --template "[X] was born in [Y] ." \
//!     --vocab-counts counts.tsv
//!
//! # Negation probing
//! factprobe run --dataset P19.jsonl --template "[X] was born in [Y] ." \
//!     --template-negated "[X] was not born in [Y] ." --use-negated-probes \
//!     --vocab-counts counts.tsv
//!
//! # Every relation of a suite
//! factprobe suite --relations relations.jsonl --vocab-counts counts.tsv
//!
//! # Check dataset files
//! factprobe validate P19.jsonl P20.jsonl
//! ```

use std::process::ExitCode;

use clap::Parser;
use factprobe::cli::{dispatch, Cli};

fn main() -> ExitCode {
    let cli = Cli::parse();
    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
