//! Factual knowledge probing.
//!
//! # Overview
//!
//! A probe pairs a subject and an object with sentences in which the object
//! is masked: `"Dante was born in [MASK] ."` with object `Florence`. The
//! pipeline asks a language model to fill the mask and scores where the
//! object lands in its distribution.
//!
//! ```text
//! store ─▶ filter ─▶ template ─▶ batch ─▶ engine ─▶ aggregate
//! (JSONL)  (scorable?) (facts)   (length   (rayon     (MRR, P@k,
//!                                 order)    pool)      strata)
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use factprobe::backends::MockLanguageModel;
//! use factprobe::eval::{run_evaluation, LogProbRanker, ProbeConfig};
//!
//! let dir = tempfile::tempdir()?;
//! let dataset = dir.path().join("probes.jsonl");
//! std::fs::write(
//!     &dataset,
//!     r#"{"sub_label": "Dante", "obj_label": "Florence", "masked_sentences": ["Dante was born in [MASK] ."]}"#,
//! )?;
//!
//! let model = MockLanguageModel::new("mock", ["[MASK]", "Rome", "Florence"])
//!     .predicting("Dante", "Florence");
//! let config = ProbeConfig::new(&dataset);
//! let run = run_evaluation(&config, &model, &LogProbRanker)?;
//! assert_eq!(run.summary.precision_at_1, Some(1.0));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Modes
//!
//! | Mode | Enabled by | Effect |
//! |------|------------|--------|
//! | plain | default | probes keep their own sentences |
//! | template | `template` | one `[X] ... [Y]` sentence per fact |
//! | context | `use_context` | evidence sentence prepended |
//! | synthetic | `synthetic` | context object swapped for a wrong one |
//! | negation | `use_negated_probes` | negated sentences compared |
//!
//! # Metrics
//!
//! - MRR, P@10, P@1 over all samples
//! - MRR and P@10 split by annotator judgment
//! - macro P@1 over facts in context mode
//! - overlap@1 and Spearman correlation in negation mode

pub mod aggregate;
pub mod batch;
pub mod config;
pub mod engine;
pub mod filter;
pub mod ranking;
pub mod rundir;
pub mod runner;
pub mod store;
pub mod suite;
pub mod template;

pub use aggregate::{
    Aggregator, EvaluationSummary, JudgmentSummary, MacroAccuracy, NegationSummary,
    StratumSummary,
};
pub use batch::{batchify, batchify_negated, Batch};
pub use config::ProbeConfig;
pub use engine::{EngineOptions, MetricsEngine, SampleOutcome};
pub use filter::{filter_probes, Exclusion, ExclusionReason, FilterOptions, FilterReport};
pub use ranking::{
    spearman, LogProbRanker, NegationQuery, NegationResult, Prediction, RankQuery, Ranker,
    RankingResult,
};
pub use rundir::{prepare_run_dir, write_args};
pub use runner::{run_evaluation, RunReport};
pub use store::{load_probes, lowercase_probes, parse_probes, DatasetReport};
pub use suite::{load_relations, run_suite, RelationSpec, SuiteReport};
pub use template::{materialize, parse_template, MaterializeOptions, MaterializeReport};
