//! CLI argument parsing and structure definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use super::commands::{RunArgs, SuiteArgs, ValidateArgs};
use crate::eval::ProbeConfig;

/// Factual knowledge probing for masked language models
#[derive(Parser, Debug)]
#[command(name = "factprobe")]
#[command(
    author,
    version,
    about = "Factual knowledge probing for masked language models",
    long_about = r#"
factprobe - score how well a language model fills in masked facts

PIPELINE:
  load -> filter -> template -> batch -> score (worker pool) -> aggregate

MODELS:
  • unigram - frequency prior from a token<TAB>count file (--vocab-counts)

EXAMPLES:
  factprobe run --dataset P19.jsonl --template "[X] was born in [Y] ." --vocab-counts counts.tsv
  factprobe suite --relations relations.jsonl --vocab-counts counts.tsv
  factprobe validate P19.jsonl
"#
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Probe one dataset
    #[command(visible_alias = "r")]
    Run(RunArgs),

    /// Probe every relation of a relations file
    #[command(visible_alias = "s")]
    Suite(SuiteArgs),

    /// Check JSONL probe files without a model
    #[command(visible_alias = "v")]
    Validate(ValidateArgs),
}

/// Options shared by `run` and `suite`.
#[derive(Args, Debug, Clone)]
pub struct ProbeArgs {
    /// Language model(s), comma separated; exactly one is accepted
    #[arg(long = "lm", value_delimiter = ',', default_value = "unigram")]
    pub models: Vec<String>,

    /// token<TAB>count file for the unigram model
    #[arg(long, value_name = "PATH")]
    pub vocab_counts: Option<PathBuf>,

    /// Common vocabulary, one token per line
    #[arg(long, value_name = "PATH")]
    pub common_vocab: Option<PathBuf>,

    /// Base directory for run directories
    #[arg(long, default_value = "output", value_name = "DIR")]
    pub logdir: PathBuf,

    /// Maximum words per probe or evidence sentence
    #[arg(long, default_value_t = 100)]
    pub max_sentence_length: usize,

    /// Samples per batch
    #[arg(short, long, default_value_t = 32)]
    pub batch_size: usize,

    /// Worker threads (0 = all cores)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Lowercase labels and sentences
    #[arg(long)]
    pub lowercase: bool,

    /// Score negated sentences as well
    #[arg(long)]
    pub use_negated_probes: bool,

    /// Condition on evidence sentences (needs a template)
    #[arg(long)]
    pub use_context: bool,

    /// Replace context objects with random wrong ones
    #[arg(long)]
    pub synthetic: bool,

    /// Print every prediction and wait for Enter
    #[arg(long)]
    pub interactive: bool,

    /// Keep dataset order before batching
    #[arg(long)]
    pub no_shuffle: bool,

    /// Seed for shuffling and synthetic draws
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Ranking depth
    #[arg(long, default_value_t = 10_000)]
    pub top_k: usize,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl ProbeArgs {
    /// Configuration with everything but dataset and templates filled in.
    pub fn to_config(&self) -> ProbeConfig {
        ProbeConfig {
            models: self.models.clone(),
            logdir: self.logdir.clone(),
            common_vocab: self.common_vocab.clone(),
            vocab_counts: self.vocab_counts.clone(),
            max_sentence_length: self.max_sentence_length,
            batch_size: self.batch_size,
            threads: self.threads,
            lowercase: self.lowercase,
            use_negated_probes: self.use_negated_probes,
            use_context: self.use_context,
            synthetic: self.synthetic,
            interactive: self.interactive,
            shuffle: !self.no_shuffle,
            seed: self.seed,
            top_k: self.top_k,
            ..ProbeConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_to_config() {
        let cli = Cli::try_parse_from([
            "factprobe",
            "run",
            "--dataset",
            "P19.jsonl",
            "--template",
            "[X] was born in [Y] .",
            "--lm",
            "unigram",
            "--batch-size",
            "4",
            "--no-shuffle",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        let config = args.to_config();
        assert_eq!(config.batch_size, 4);
        assert!(!config.shuffle);
        assert_eq!(config.template(), Some("[X] was born in [Y] ."));
        assert_eq!(config.dataset, PathBuf::from("P19.jsonl"));
    }

    #[test]
    fn test_comma_separated_models() {
        let cli = Cli::try_parse_from([
            "factprobe",
            "run",
            "--dataset",
            "x.jsonl",
            "--lm",
            "unigram,bert",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        let config = args.to_config();
        assert_eq!(config.models, vec!["unigram", "bert"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_takes_files() {
        let cli = Cli::try_parse_from(["factprobe", "validate", "a.jsonl", "b.jsonl"]).unwrap();
        assert!(matches!(cli.command, Commands::Validate(ref a) if a.files.len() == 2));
    }
}
