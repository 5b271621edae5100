//! Run configuration.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for one probing run.
///
/// Serialized verbatim to `args.json` in the run directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Model selectors. Exactly one is allowed per run.
    pub models: Vec<String>,
    /// JSONL probe file
    pub dataset: PathBuf,
    /// Template with `[X]` (subject) and `[Y]` (object) placeholders
    pub template: Option<String>,
    /// Negated template, used with `use_negated_probes`
    pub template_negated: Option<String>,
    /// Base directory for timestamped run directories
    pub logdir: PathBuf,
    /// Explicit run directory (overrides `logdir`)
    pub full_logdir: Option<PathBuf>,
    /// Common vocabulary file, one token per line
    pub common_vocab: Option<PathBuf>,
    /// `token<TAB>count` file for the unigram model
    pub vocab_counts: Option<PathBuf>,
    /// Maximum number of words per probe (or per evidence sentence)
    pub max_sentence_length: usize,
    /// Samples per batch
    pub batch_size: usize,
    /// Worker pool size (0 = all available parallelism)
    pub threads: usize,
    /// Lowercase labels and sentences before filtering
    pub lowercase: bool,
    /// Score negated sentences and report negation consistency
    pub use_negated_probes: bool,
    /// Condition on evidence sentences (template mode only)
    pub use_context: bool,
    /// Replace objects in contexts with random wrong ones (needs context)
    pub synthetic: bool,
    /// Print every prediction and wait for Enter
    pub interactive: bool,
    /// Shuffle samples before batching
    pub shuffle: bool,
    /// Seed for shuffling and synthetic draws
    pub seed: u64,
    /// Ranking depth
    pub top_k: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            models: vec!["unigram".to_string()],
            dataset: PathBuf::new(),
            template: None,
            template_negated: None,
            logdir: PathBuf::from("output"),
            full_logdir: None,
            common_vocab: None,
            vocab_counts: None,
            max_sentence_length: 100,
            batch_size: 32,
            threads: 0,
            lowercase: false,
            use_negated_probes: false,
            use_context: false,
            synthetic: false,
            interactive: false,
            shuffle: true,
            seed: 0,
            top_k: 10_000,
        }
    }
}

impl ProbeConfig {
    /// Default configuration for `dataset`.
    pub fn new(dataset: impl Into<PathBuf>) -> Self {
        Self {
            dataset: dataset.into(),
            ..Self::default()
        }
    }

    /// Set the template.
    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Enable negation probing with the given negated template (if any).
    #[must_use]
    pub fn with_negation(mut self, template_negated: Option<String>) -> Self {
        self.use_negated_probes = true;
        self.template_negated = template_negated;
        self
    }

    /// Enable context-conditioned probing.
    #[must_use]
    pub fn with_context(mut self, synthetic: bool) -> Self {
        self.use_context = true;
        self.synthetic = synthetic;
        self
    }

    /// Set the batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the maximum sentence length in words.
    #[must_use]
    pub fn with_max_sentence_length(mut self, max: usize) -> Self {
        self.max_sentence_length = max;
        self
    }

    /// Set the common vocabulary file.
    #[must_use]
    pub fn with_common_vocab(mut self, path: impl AsRef<Path>) -> Self {
        self.common_vocab = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the unigram counts file.
    #[must_use]
    pub fn with_vocab_counts(mut self, path: impl AsRef<Path>) -> Self {
        self.vocab_counts = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the worker pool size.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Set the run directory explicitly.
    #[must_use]
    pub fn with_full_logdir(mut self, dir: impl AsRef<Path>) -> Self {
        self.full_logdir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// The configured template, if non-empty.
    #[must_use]
    pub fn template(&self) -> Option<&str> {
        self.template.as_deref().filter(|t| !t.trim().is_empty())
    }

    /// The single model selector.
    pub fn model_selector(&self) -> Result<&str> {
        match self.models.as_slice() {
            [single] => Ok(single.as_str()),
            [] => Err(Error::config("no language model specified")),
            _ => Err(Error::config(
                "Please specify a single language model (e.g., --lm \"unigram\").",
            )),
        }
    }

    /// Check option combinations before any work starts.
    pub fn validate(&self) -> Result<()> {
        self.model_selector()?;
        if self.batch_size == 0 {
            return Err(Error::config("batch size must be at least 1"));
        }
        if self.synthetic && !self.use_context {
            return Err(Error::config(
                "synthetic negatives require context-conditioned probing",
            ));
        }
        if self.use_context && self.template().is_none() {
            return Err(Error::config("context-conditioned probing requires a template"));
        }
        if self.use_negated_probes && self.template().is_some() {
            let negated = self.template_negated.as_deref().unwrap_or("");
            if negated.trim().is_empty() {
                return Err(Error::config(
                    "negation probing with a template requires a negated template",
                ));
            }
        }
        Ok(())
    }
}
