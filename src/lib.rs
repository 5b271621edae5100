//! # factprobe
//!
//! Cloze-style factual knowledge probing for masked language models.
//!
//! - **Probes**: JSON-lines datasets (`sub_label`, `obj_label`,
//!   `masked_sentences`, optional evidences, negations, judgments)
//! - **Pipeline**: filter, template, batch, score on a worker pool, aggregate
//! - **Metrics**: MRR, P@10, P@1, judgment strata, macro P@1, negation
//!   overlap and Spearman correlation
//!
//! ## Quick Start
//!
//! ```rust
//! use factprobe::prelude::*;
//!
//! let model = UnigramModel::parse("Florence\t5\nRome\t9\n")?;
//! let probes = vec![RawProbe::new("Dante", "Florence", ["Dante was born in [MASK] ."])];
//!
//! let (kept, report) = filter_probes(&model, probes, &FilterOptions::default());
//! assert_eq!(kept.len(), 1);
//! assert_eq!(report.excluded(), 0);
//! # Ok::<(), factprobe::Error>(())
//! ```
//!
//! ## Backends
//!
//! | Backend | Selector | Notes |
//! |---------|----------|-------|
//! | `UnigramModel` | `unigram` | frequency prior, the majority baseline |
//! | `MockLanguageModel` | - | scripted, for tests |
//!
//! Real masked language models plug in through [`LanguageModel`].
//!
//! ## Feature Flags
//!
//! ```toml
//! [dependencies]
//! factprobe = "0.1"                                          # library + CLI
//! factprobe = { version = "0.1", default-features = false }  # library only
//! ```

#![warn(missing_docs)]

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
mod error;
pub mod eval;
pub mod probe;
pub mod vocab;

pub mod prelude {
    //! Commonly used items, re-exported for convenience.
    //!
    //! ```rust
    //! use factprobe::prelude::*;
    //!
    //! let config = ProbeConfig::new("P19.jsonl").with_template("[X] was born in [Y] .");
    //! assert!(config.validate().is_ok());
    //! ```
    pub use crate::backends::{create_model, LanguageModel, MockLanguageModel, UnigramModel};
    pub use crate::error::{Error, Result};
    pub use crate::eval::{
        filter_probes, run_evaluation, EvaluationSummary, FilterOptions, LogProbRanker,
        ProbeConfig, Ranker,
    };
    pub use crate::probe::{FilteredProbe, RawProbe, Sample};
    pub use crate::vocab::{VocabSubset, Vocabulary};
}

// Re-exports
pub use backends::{LanguageModel, SampleGeneration};
pub use error::{Error, Result};
pub use eval::{run_evaluation, EvaluationSummary, ProbeConfig};
pub use probe::{Evidence, FilteredProbe, Judgment, ProbeId, RawProbe, Sample, MASK};
pub use vocab::{VocabSubset, Vocabulary};
