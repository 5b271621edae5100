//! Concurrent metrics engine.
//!
//! Per batch, the driver calls the model once, restricts the
//! log-probabilities to the common vocabulary when one is configured, and
//! fans per-sample ranking out to a fixed-size rayon pool. Results come back
//! in submission order; workers never touch shared state.
//!
//! ```text
//! driver ── get_batch_generation ──▶ model
//!   │
//!   ├─ filter_logprobs (optional)
//!   │
//!   └─ pool.install(par_iter) ──▶ Ranker::rank      (one task per sample)
//!                              └─▶ Ranker::negation  (negation probing)
//! ```

use super::batch::{is_empty_negated, Batch};
use super::ranking::{NegationQuery, NegationResult, RankQuery, Ranker, RankingResult};
use crate::backends::{FilterIndices, LanguageModel, LogProbRows, SampleGeneration};
use crate::probe::Sample;
use crate::vocab::VocabSubset;
use crate::{Error, Result};
use rayon::prelude::*;

/// Engine settings.
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions<'a> {
    /// Worker pool size, 0 for all available parallelism
    pub threads: usize,
    /// Ranking depth
    pub top_k: usize,
    /// Common vocabulary restriction
    pub vocab_subset: Option<&'a VocabSubset>,
    /// Score negated sentences too
    pub use_negation: bool,
}

impl Default for EngineOptions<'_> {
    fn default() -> Self {
        Self {
            threads: 0,
            top_k: 10_000,
            vocab_subset: None,
            use_negation: false,
        }
    }
}

/// Everything computed for one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleOutcome {
    /// Ranking metrics
    pub ranking: RankingResult,
    /// Negation metrics (negation probing only)
    pub negation: Option<NegationResult>,
    /// Vocabulary id of the object label
    pub label_index: usize,
    /// Masked positions of the affirmative input
    pub masked_positions: Vec<usize>,
}

/// Rows each sample is ranked on: filtered when a subset is configured.
fn rows_of<'g>(
    generations: &'g [SampleGeneration],
    filtered: Option<&'g [LogProbRows]>,
) -> Vec<&'g LogProbRows> {
    match filtered {
        Some(rows) => rows.iter().collect(),
        None => generations.iter().map(|g| &g.log_probs).collect(),
    }
}

/// Scores batches against a model on a worker pool.
pub struct MetricsEngine<'a> {
    model: &'a dyn LanguageModel,
    ranker: &'a dyn Ranker,
    pool: rayon::ThreadPool,
    vocab_subset: Option<&'a VocabSubset>,
    filter: Option<FilterIndices>,
    top_k: usize,
    use_negation: bool,
}

impl std::fmt::Debug for MetricsEngine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsEngine")
            .field("model", &self.model.name())
            .field("threads", &self.pool.current_num_threads())
            .field("filtered", &self.filter.is_some())
            .field("top_k", &self.top_k)
            .field("use_negation", &self.use_negation)
            .finish()
    }
}

impl<'a> MetricsEngine<'a> {
    /// Build the worker pool and, with a vocabulary subset, prepare the
    /// model's filter indices once for the whole run.
    pub fn new(
        model: &'a dyn LanguageModel,
        ranker: &'a dyn Ranker,
        options: EngineOptions<'a>,
    ) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.threads)
            .thread_name(|i| format!("factprobe-worker-{}", i))
            .build()
            .map_err(|e| Error::config(format!("cannot build worker pool: {}", e)))?;

        let filter = options.vocab_subset.map(|subset| {
            model.optimize_top_layer(subset);
            model.init_indices_for_filter_logprobs(subset)
        });

        log::info!(
            "metrics engine: {} workers, top_k {}, {}",
            pool.current_num_threads(),
            options.top_k,
            if filter.is_some() {
                "common vocabulary"
            } else {
                "full vocabulary"
            }
        );

        Ok(Self {
            model,
            ranker,
            pool,
            vocab_subset: options.vocab_subset,
            filter,
            top_k: options.top_k,
            use_negation: options.use_negation,
        })
    }

    /// Number of worker threads.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Vocabulary id of one object label.
    ///
    /// The label must map to exactly one id whose vocabulary entry is the
    /// label itself, and lie in the vocabulary subset when one is set.
    pub fn label_index(&self, label: &str) -> Result<usize> {
        let ids = self
            .model
            .get_id(label)
            .ok_or_else(|| Error::vocabulary_mismatch(label, "not in model vocabulary"))?;
        let id = match ids.as_slice() {
            [id] if self.model.vocab().get(*id) == Some(label) => *id,
            _ => return Err(Error::vocabulary_mismatch(label, "not in model vocabulary")),
        };
        if let Some(subset) = self.vocab_subset {
            if !subset.contains(label) {
                return Err(Error::vocabulary_mismatch(label, "not in vocab subset"));
            }
        }
        Ok(id)
    }

    /// Vocabulary ids of the object labels of `samples`, aborting on the
    /// first label that fails [`label_index`](Self::label_index).
    pub fn label_indices(&self, samples: &[Sample]) -> Result<Vec<usize>> {
        samples
            .iter()
            .map(|s| self.label_index(&s.object_label))
            .collect()
    }

    fn generate(&self, sentences: &[Vec<String>]) -> Result<Vec<SampleGeneration>> {
        let generations = self.model.get_batch_generation(sentences)?;
        if generations.len() != sentences.len() {
            return Err(Error::inference(format!(
                "model returned {} generations for a batch of {}",
                generations.len(),
                sentences.len()
            )));
        }
        Ok(generations)
    }

    fn restrict(&self, generations: &[SampleGeneration]) -> Result<Option<Vec<LogProbRows>>> {
        let Some(filter) = &self.filter else {
            return Ok(None);
        };
        let rows = self.model.filter_logprobs(generations, filter);
        if rows.len() != generations.len() {
            return Err(Error::inference(format!(
                "filtering returned {} rows for {} generations",
                rows.len(),
                generations.len()
            )));
        }
        Ok(Some(rows))
    }

    /// Score one batch. `negated` is the matching negated batch when
    /// negation probing is on.
    pub fn score_batch(
        &self,
        batch: &Batch,
        negated: Option<&[Vec<String>]>,
    ) -> Result<Vec<SampleOutcome>> {
        let labels = self.label_indices(&batch.samples)?;
        let generations = self.generate(&batch.sentences)?;
        let filtered = self.restrict(&generations)?;
        let rows = rows_of(&generations, filtered.as_deref());

        let index_list = self.filter.as_ref();
        let rankings: Vec<RankingResult> = self.pool.install(|| {
            (0..batch.len())
                .into_par_iter()
                .map(|i| {
                    self.ranker.rank(&RankQuery {
                        log_probs: rows[i],
                        masked_positions: &generations[i].masked_positions,
                        vocab: self.model.vocab(),
                        label_index: labels[i],
                        index_list,
                        top_k: self.top_k,
                    })
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let negations = match (self.use_negation, negated) {
            (true, Some(negated)) => Some(self.score_negated(negated, &generations, &rows)?),
            _ => None,
        };

        let mut negations = negations.map(Vec::into_iter);
        Ok(rankings
            .into_iter()
            .zip(labels)
            .zip(&generations)
            .map(|((ranking, label_index), generation)| SampleOutcome {
                ranking,
                negation: negations.as_mut().and_then(Iterator::next),
                label_index,
                masked_positions: generation.masked_positions.clone(),
            })
            .collect())
    }

    fn score_negated(
        &self,
        negated: &[Vec<String>],
        generations: &[SampleGeneration],
        rows: &[&LogProbRows],
    ) -> Result<Vec<NegationResult>> {
        if negated.len() != generations.len() {
            return Err(Error::inference(format!(
                "negated batch has {} entries for a batch of {}",
                negated.len(),
                generations.len()
            )));
        }
        if is_empty_negated(negated) {
            log::debug!("no negated sentences in batch, skipping");
            return Ok(vec![NegationResult::undefined(); negated.len()]);
        }

        let negated_generations = self.generate(negated)?;
        let negated_filtered = self.restrict(&negated_generations)?;
        let negated_rows = rows_of(&negated_generations, negated_filtered.as_deref());

        Ok(self.pool.install(|| {
            (0..negated.len())
                .into_par_iter()
                .map(|i| {
                    self.ranker.negation(&NegationQuery {
                        log_probs: rows[i],
                        masked_positions: &generations[i].masked_positions,
                        log_probs_negated: negated_rows[i],
                        masked_positions_negated: &negated_generations[i].masked_positions,
                    })
                })
                .collect()
        }))
    }

    /// Signal the pool to shut down after the last batch. Workers exit on
    /// their own; this does not wait for them.
    pub fn finish(self) {
        log::debug!("metrics engine: shutting down {} workers", self.threads());
        drop(self.pool);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MockLanguageModel;
    use crate::eval::batch::batchify;
    use crate::eval::ranking::LogProbRanker;
    use crate::probe::ProbeId;

    fn model() -> MockLanguageModel {
        MockLanguageModel::new("mock", ["[MASK]", "[UNK]", "Rome", "Paris", "Florence"])
            .predicting("Dante", "Florence")
            .predicting("Caesar", "Rome")
    }

    fn sample(id: u64, subject: &str, object: &str) -> Sample {
        Sample {
            uuid: ProbeId::Index(id),
            subject_label: subject.into(),
            object_label: object.into(),
            object_surface: None,
            context: None,
            masked_sentences: vec![format!("{} was born in [MASK] .", subject)],
            negated: None,
            judgments: None,
        }
    }

    #[test]
    fn test_scores_in_submission_order() {
        let model = model();
        let ranker = LogProbRanker;
        let engine = MetricsEngine::new(
            &model,
            &ranker,
            EngineOptions {
                threads: 4,
                ..EngineOptions::default()
            },
        )
        .unwrap();
        let samples = vec![
            sample(0, "Dante", "Florence"),
            sample(1, "Caesar", "Rome"),
            sample(2, "Dante", "Paris"),
        ];
        let batch = &batchify(&samples, 8).unwrap()[0];
        let outcomes = engine.score_batch(batch, None).unwrap();
        assert_eq!(outcomes.len(), 3);
        for (sample, outcome) in batch.samples.iter().zip(&outcomes) {
            let top = outcome.ranking.top().unwrap();
            let expected = if sample.subject_label == "Dante" { "Florence" } else { "Rome" };
            assert_eq!(top.token_word_form, expected);
        }
        assert_eq!(model.calls(), 1);
        engine.finish();
    }

    #[test]
    fn test_label_must_be_single_exact_token() {
        let model = MockLanguageModel::new("mock", ["[MASK]", "New", "York"]);
        let ranker = LogProbRanker;
        let engine = MetricsEngine::new(&model, &ranker, EngineOptions::default()).unwrap();
        let err = engine.label_index("New York").unwrap_err();
        assert_eq!(err.to_string(), "object label New York not in model vocabulary");
        assert!(engine.label_index("Boston").is_err());
        assert_eq!(engine.label_index("York").unwrap(), 2);
    }

    #[test]
    fn test_label_outside_subset() {
        let model = model();
        let ranker = LogProbRanker;
        let subset = VocabSubset::new(["Rome", "Florence"]);
        let engine = MetricsEngine::new(
            &model,
            &ranker,
            EngineOptions {
                vocab_subset: Some(&subset),
                ..EngineOptions::default()
            },
        )
        .unwrap();
        let err = engine.label_index("Paris").unwrap_err();
        assert!(err.to_string().contains("not in vocab subset"));
    }

    #[test]
    fn test_filtered_ranking() {
        let model = model();
        let ranker = LogProbRanker;
        let subset = VocabSubset::new(["Rome", "Florence"]);
        let engine = MetricsEngine::new(
            &model,
            &ranker,
            EngineOptions {
                vocab_subset: Some(&subset),
                ..EngineOptions::default()
            },
        )
        .unwrap();
        let batch = &batchify(&[sample(0, "Caesar", "Florence")], 1).unwrap()[0];
        let outcome = &engine.score_batch(batch, None).unwrap()[0];
        // Rome first, Florence second among the two kept columns
        assert_eq!(outcome.ranking.rank, Some(2));
        assert_eq!(outcome.ranking.topk.len(), 2);
        assert_eq!(outcome.ranking.mrr, 0.5);
    }

    #[test]
    fn test_empty_negated_batch_skips_model() {
        let model = model();
        let ranker = LogProbRanker;
        let engine = MetricsEngine::new(
            &model,
            &ranker,
            EngineOptions {
                use_negation: true,
                ..EngineOptions::default()
            },
        )
        .unwrap();
        let samples = vec![sample(0, "Dante", "Florence"), sample(1, "Caesar", "Rome")];
        let batch = &batchify(&samples, 2).unwrap()[0];
        let negated = vec![vec![String::new()], vec![String::new()]];
        let outcomes = engine.score_batch(batch, Some(&negated)).unwrap();
        assert_eq!(model.calls(), 1);
        assert!(outcomes
            .iter()
            .all(|o| o.negation.as_ref().map_or(false, |n| !n.is_defined())));
    }

    #[test]
    fn test_negated_scored() {
        let model = model();
        let ranker = LogProbRanker;
        let engine = MetricsEngine::new(
            &model,
            &ranker,
            EngineOptions {
                use_negation: true,
                ..EngineOptions::default()
            },
        )
        .unwrap();
        let samples = vec![sample(0, "Dante", "Florence"), sample(1, "Caesar", "Rome")];
        let batch = &batchify(&samples, 2).unwrap()[0];
        let negated = vec![
            vec!["Dante was not born in [MASK] .".to_string()],
            vec![String::new()],
        ];
        let outcomes = engine.score_batch(batch, Some(&negated)).unwrap();
        assert_eq!(model.calls(), 2);
        let first = outcomes[0].negation.as_ref().unwrap();
        assert_eq!(first.overlap_at_1, 1.0);
        assert!(first.is_defined());
        assert!(!outcomes[1].negation.as_ref().unwrap().is_defined());
    }
}
