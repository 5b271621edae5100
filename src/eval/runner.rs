//! The probing pipeline, end to end.
//!
//! ```text
//! load ─▶ filter ─▶ materialize / into_samples ─▶ shuffle ─▶ batchify
//!                                                              │
//!        summary ◀── Aggregator ◀── (sequential fold) ◀── MetricsEngine
//! ```

use super::aggregate::{Aggregator, EvaluationSummary};
use super::batch::{batchify, batchify_negated};
use super::config::ProbeConfig;
use super::engine::{EngineOptions, MetricsEngine, SampleOutcome};
use super::filter::{filter_probes, FilterOptions, FilterReport};
use super::ranking::Ranker;
use super::store::{load_probes, lowercase_probes};
use super::template::{materialize, MaterializeOptions, MaterializeReport};
use crate::backends::LanguageModel;
use crate::probe::{into_samples, Sample};
use crate::vocab::VocabSubset;
use crate::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::io::{BufRead, Write};

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Final statistics
    pub summary: EvaluationSummary,
    /// Filter diagnostics
    pub filter: FilterReport,
    /// Template diagnostics (template mode only)
    pub materialize: Option<MaterializeReport>,
    /// Batches scored
    pub batches: usize,
}

/// Run the whole pipeline for one configuration.
///
/// Fails before any scoring on configuration errors, and mid-run on the
/// first vocabulary inconsistency or model failure. No partial summary is
/// produced on failure.
pub fn run_evaluation(
    config: &ProbeConfig,
    model: &dyn LanguageModel,
    ranker: &dyn Ranker,
) -> Result<RunReport> {
    config.validate()?;
    log::info!("model name: {}", model.run_name());

    let vocab_subset = match &config.common_vocab {
        Some(path) => {
            let subset = VocabSubset::load(path)?;
            log::info!("common vocabulary size: {}", subset.len());
            Some(subset)
        }
        None => None,
    };

    let probes = load_probes(&config.dataset)?;
    if config.lowercase {
        // The lowercased copy is reported only; filtering sees the originals.
        let lowered = lowercase_probes(&probes, config.use_negated_probes);
        log::info!("lowercased {} probes", lowered.len());
    }

    let (kept, filter_report) = filter_probes(
        model,
        probes,
        &FilterOptions {
            vocab_subset: vocab_subset.as_ref(),
            max_sentence_length: config.max_sentence_length,
            template: config.template(),
        },
    );
    log::info!("\n{}", filter_report);

    let (mut samples, materialize_report) = match config.template() {
        Some(template) => {
            let options = MaterializeOptions {
                template,
                template_negated: config
                    .template_negated
                    .as_deref()
                    .filter(|_| config.use_negated_probes),
                use_context: config.use_context,
                synthetic: config.synthetic,
                max_sentence_length: config.max_sentence_length,
                seed: config.seed,
            };
            let (samples, report) = materialize(&kept, &options)?;
            (samples, Some(report))
        }
        None => (into_samples(kept), None),
    };

    if config.shuffle {
        let mut rng = StdRng::seed_from_u64(config.seed);
        samples.shuffle(&mut rng);
    }

    let batches = batchify(&samples, config.batch_size)?;
    let negated_batches = if config.use_negated_probes {
        Some(batchify_negated(&samples, config.batch_size)?)
    } else {
        None
    };
    log::info!("{} samples in {} batches", samples.len(), batches.len());

    let engine = MetricsEngine::new(
        model,
        ranker,
        EngineOptions {
            threads: config.threads,
            top_k: config.top_k,
            vocab_subset: vocab_subset.as_ref(),
            use_negation: config.use_negated_probes,
        },
    )?;

    let mut aggregator = Aggregator::new(config.use_context, config.use_negated_probes);
    for (i, batch) in batches.iter().enumerate() {
        let negated = negated_batches
            .as_ref()
            .and_then(|n| n.get(i))
            .map(Vec::as_slice);
        let outcomes = engine.score_batch(batch, negated)?;
        for (sample, outcome) in batch.samples.iter().zip(&outcomes) {
            log::debug!("\n{}", outcome.ranking.log_text);
            if config.interactive {
                pause(sample, outcome)?;
            }
            aggregator.record(sample, &outcome.ranking, outcome.negation.as_ref());
        }
        log::debug!("batch {}/{} done", i + 1, batches.len());
    }
    engine.finish();

    let summary = aggregator.finalize(samples.len());
    log::info!("\n{}", summary);

    Ok(RunReport {
        summary,
        filter: filter_report,
        materialize: materialize_report,
        batches: batches.len(),
    })
}

/// Print one sample's predictions and wait for Enter.
fn pause(sample: &Sample, outcome: &SampleOutcome) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", serde_json::to_string_pretty(sample)?)?;
    write!(out, "{}", outcome.ranking.log_text)?;
    if let Some(log_prob) = outcome.ranking.label_log_prob {
        writeln!(out, "label log-prob: {:.3}", log_prob)?;
    }
    write!(out, "press enter to continue...")?;
    out.flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(())
}
