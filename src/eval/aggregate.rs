//! Aggregation of per-sample results into run statistics.
//!
//! The [`Aggregator`] is owned by the sequential driver and folded one
//! sample at a time, in batch order. [`Aggregator::finalize`] normalizes
//! every running sum exactly once; a sum with a zero count stays unset.
//!
//! # Statistics
//!
//! | Statistic | Samples | Note |
//! |-----------|---------|------|
//! | MRR, P@10, P@1 | all | global means |
//! | judgment strata | with judgments | `no >= yes` is negative |
//! | macro P@1 | context mode | a fact scores if any of its flags is set |
//! | overlap@1, Spearman | negation mode | NaN correlations are skipped |

use super::ranking::{NegationResult, RankingResult};
use crate::probe::{JudgmentTally, Sample};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, Default)]
struct Stratum {
    mrr: f64,
    precision_at_10: f64,
    count: usize,
}

impl Stratum {
    fn add(&mut self, ranking: &RankingResult) {
        self.mrr += ranking.mrr;
        self.precision_at_10 += ranking.precision_at_10;
        self.count += 1;
    }

    fn finalize(self) -> StratumSummary {
        StratumSummary {
            samples: self.count,
            mrr: mean(self.mrr, self.count),
            precision_at_10: mean(self.precision_at_10, self.count),
        }
    }
}

fn mean(sum: f64, count: usize) -> Option<f64> {
    (count > 0).then(|| sum / count as f64)
}

/// Running statistics for one run.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    use_context: bool,
    use_negation: bool,
    results: usize,
    mrr: f64,
    precision_at_10: f64,
    precision_at_1: f64,
    negative: Stratum,
    positive: Stratum,
    facts: BTreeMap<(String, String), Vec<bool>>,
    overlap: f64,
    correlation: f64,
    valid_negations: usize,
}

impl Aggregator {
    /// Start a run with all sums at zero.
    #[must_use]
    pub fn new(use_context: bool, use_negation: bool) -> Self {
        Self {
            use_context,
            use_negation,
            ..Self::default()
        }
    }

    /// Samples recorded so far.
    #[must_use]
    pub fn results(&self) -> usize {
        self.results
    }

    /// Fold one sample's results in.
    pub fn record(
        &mut self,
        sample: &Sample,
        ranking: &RankingResult,
        negation: Option<&NegationResult>,
    ) {
        self.mrr += ranking.mrr;
        self.precision_at_10 += ranking.precision_at_10;
        self.precision_at_1 += ranking.precision_at_1;
        self.results += 1;

        if let Some(judgments) = &sample.judgments {
            if JudgmentTally::of(judgments).is_negative() {
                self.negative.add(ranking);
            } else {
                self.positive.add(ranking);
            }
        }

        if self.use_context {
            let surface_match = match (ranking.top(), &sample.object_surface) {
                (Some(top), Some(surface)) => {
                    top.token_word_form.to_lowercase() == surface.to_lowercase()
                }
                _ => false,
            };
            let flags = self
                .facts
                .entry((sample.subject_label.clone(), sample.object_label.clone()))
                .or_default();
            flags.push(ranking.precision_at_1 == 1.0);
            flags.push(surface_match);
        }

        if self.use_negation {
            if let Some(negation) = negation.filter(|n| n.is_defined()) {
                self.overlap += negation.overlap_at_1;
                self.correlation += negation.correlation;
                self.valid_negations += 1;
            }
        }
    }

    /// Normalize every statistic. `all_samples` is the number of samples
    /// that entered batching.
    #[must_use]
    pub fn finalize(self, all_samples: usize) -> EvaluationSummary {
        let macro_accuracy = self.use_context.then(|| {
            let correct = self
                .facts
                .values()
                .filter(|flags| flags.iter().any(|&f| f))
                .count();
            MacroAccuracy {
                facts: self.facts.len(),
                correct,
                precision_at_1: mean(correct as f64, self.facts.len()),
            }
        });

        let negation = self.use_negation.then(|| NegationSummary {
            samples: self.valid_negations,
            spearman: mean(self.correlation, self.valid_negations),
            overlap_at_1: mean(self.overlap, self.valid_negations),
        });

        let judgments = (self.negative.count + self.positive.count > 0).then(|| JudgmentSummary {
            negative: self.negative.finalize(),
            positive: self.positive.finalize(),
        });

        EvaluationSummary {
            all_samples,
            results: self.results,
            mrr: mean(self.mrr, self.results),
            precision_at_10: mean(self.precision_at_10, self.results),
            precision_at_1: mean(self.precision_at_1, self.results),
            macro_accuracy,
            negation,
            judgments,
        }
    }
}

/// Means over one judgment stratum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StratumSummary {
    /// Samples in the stratum
    pub samples: usize,
    /// Mean reciprocal rank
    pub mrr: Option<f64>,
    /// Mean precision@10
    pub precision_at_10: Option<f64>,
}

/// Judgment-stratified results.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JudgmentSummary {
    /// `no >= yes`
    pub negative: StratumSummary,
    /// `yes > no`
    pub positive: StratumSummary,
}

/// Fact-level accuracy in context mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacroAccuracy {
    /// Distinct `(subject, object)` facts
    pub facts: usize,
    /// Facts with at least one correct prediction
    pub correct: usize,
    /// `correct / facts`
    pub precision_at_1: Option<f64>,
}

/// Negation-consistency results.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NegationSummary {
    /// Samples with a defined correlation
    pub samples: usize,
    /// Mean Spearman correlation affirmative/negated
    pub spearman: Option<f64>,
    /// Mean overlap@1 affirmative/negated
    pub overlap_at_1: Option<f64>,
}

/// Final statistics of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationSummary {
    /// Samples that entered batching
    pub all_samples: usize,
    /// Samples scored
    pub results: usize,
    /// Mean reciprocal rank
    pub mrr: Option<f64>,
    /// Mean precision@10
    pub precision_at_10: Option<f64>,
    /// Mean precision@1
    pub precision_at_1: Option<f64>,
    /// Context mode only
    pub macro_accuracy: Option<MacroAccuracy>,
    /// Negation mode only
    pub negation: Option<NegationSummary>,
    /// Present when any sample had judgments
    pub judgments: Option<JudgmentSummary>,
}

impl EvaluationSummary {
    /// `(MRR, P@10, P@1, macro P@1)`.
    #[must_use]
    pub fn headline(&self) -> (Option<f64>, Option<f64>, Option<f64>, Option<f64>) {
        (
            self.mrr,
            self.precision_at_10,
            self.precision_at_1,
            self.macro_accuracy.and_then(|m| m.precision_at_1),
        )
    }
}

struct Metric(Option<f64>);

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{:.4}", v),
            None => f.write_str("n/a"),
        }
    }
}

impl fmt::Display for EvaluationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "all_samples: {}", self.all_samples)?;
        writeln!(f, "list_of_results: {}", self.results)?;
        writeln!(f, "global MRR: {}", Metric(self.mrr))?;
        writeln!(f, "global Precision at 10: {}", Metric(self.precision_at_10))?;
        writeln!(f, "global Precision at 1: {}", Metric(self.precision_at_1))?;
        if let Some(m) = &self.macro_accuracy {
            writeln!(f, "total num facts: {}", m.facts)?;
            writeln!(f, "num facts correct: {}", m.correct)?;
            writeln!(f, "Precision at 1 (RE): {}", Metric(m.precision_at_1))?;
        }
        if let Some(n) = &self.negation {
            writeln!(f)?;
            writeln!(f, "results negation:")?;
            writeln!(f, "all_negated_samples: {}", n.samples)?;
            writeln!(
                f,
                "global spearman rank affirmative/negated: {}",
                Metric(n.spearman)
            )?;
            writeln!(
                f,
                "global overlap at 1 affirmative/negated: {}",
                Metric(n.overlap_at_1)
            )?;
        }
        if let Some(j) = &self.judgments {
            writeln!(f, "samples_with_negative_judgement: {}", j.negative.samples)?;
            writeln!(f, "samples_with_positive_judgement: {}", j.positive.samples)?;
            writeln!(f, "MRR_negative: {}", Metric(j.negative.mrr))?;
            writeln!(f, "MRR_positive: {}", Metric(j.positive.mrr))?;
            writeln!(f, "Precision_negative: {}", Metric(j.negative.precision_at_10))?;
            writeln!(f, "Precision_positive: {}", Metric(j.positive.precision_at_10))?;
        }
        Ok(())
    }
}
