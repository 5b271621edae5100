//! Language model backends.
//!
//! The probing pipeline treats the language model as an external
//! collaborator. Everything it needs is captured by [`LanguageModel`]:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ LanguageModel                                            │
//! │   vocab()                    ordered token list          │
//! │   get_id(label)              label -> token ids          │
//! │   get_batch_generation(b)    sentences -> log-probs      │
//! │   init_indices_for_filter_logprobs(subset)               │
//! │   filter_logprobs(gens, indices)                         │
//! │   optimize_top_layer(subset) best-effort hook            │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Backend Comparison
//!
//! | Backend | Selector | Context-aware | Notes |
//! |---------|----------|---------------|-------|
//! | [`UnigramModel`] | `unigram` | No | Frequency prior; majority baseline |
//! | [`MockLanguageModel`] | - | Scripted | Tests only |
//!
//! Both tokenize on whitespace against their vocabulary, so a label made of
//! several words maps to several ids.

mod factory;
mod mock;
mod unigram;

pub use factory::{create_model, AVAILABLE_MODELS};
pub use mock::MockLanguageModel;
pub use unigram::UnigramModel;

use crate::probe::MASK;
use crate::vocab::{VocabSubset, Vocabulary};
use crate::Result;

/// Unknown-word token reserved by the word-level backends.
pub const UNK: &str = "[UNK]";

/// Log-probability rows, one per masked position, each over the vocabulary
/// (or over the filtered subset after [`LanguageModel::filter_logprobs`]).
pub type LogProbRows = Vec<Vec<f32>>;

/// Model output for one sample of a batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleGeneration {
    /// One row per masked position, aligned with `masked_positions`
    pub log_probs: LogProbRows,
    /// Token ids of the whole input
    pub token_ids: Vec<usize>,
    /// Positions in `token_ids` holding the mask marker
    pub masked_positions: Vec<usize>,
}

/// Vocabulary ids kept when restricting log-probabilities to a subset.
///
/// Column `j` of a filtered row corresponds to vocabulary id `indices[j]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterIndices {
    /// Kept vocabulary ids, in subset order
    pub indices: Vec<usize>,
}

impl FilterIndices {
    /// Position of vocabulary id `id` in the filtered space.
    #[must_use]
    pub fn position(&self, id: usize) -> Option<usize> {
        self.indices.iter().position(|&i| i == id)
    }
}

/// A masked language model as seen by the probing pipeline.
///
/// Implementations must be usable from worker threads; the pipeline itself
/// only calls [`get_batch_generation`](LanguageModel::get_batch_generation)
/// from the sequential driver.
pub trait LanguageModel: Send + Sync {
    /// Selector name, e.g. `"unigram"`.
    fn name(&self) -> &str;

    /// Name used for run directories, e.g. `"Unigram"`.
    fn run_name(&self) -> String {
        let mut chars = self.name().chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// The model vocabulary.
    fn vocab(&self) -> &Vocabulary;

    /// Token ids for `label`, or `None` if it cannot be tokenized.
    fn get_id(&self, label: &str) -> Option<Vec<usize>>;

    /// Score a batch. Each entry of `batch` is the list of sentences of one
    /// sample; the output is index-aligned with `batch`.
    fn get_batch_generation(&self, batch: &[Vec<String>]) -> Result<Vec<SampleGeneration>>;

    /// Vocabulary ids of the subset tokens known to the model, in subset
    /// order.
    fn init_indices_for_filter_logprobs(&self, subset: &VocabSubset) -> FilterIndices {
        let vocab = self.vocab();
        let indices: Vec<usize> = subset.iter().filter_map(|t| vocab.id(t)).collect();
        if indices.len() < subset.len() {
            log::warn!(
                "{} of {} common vocabulary tokens are unknown to {}",
                subset.len() - indices.len(),
                subset.len(),
                self.name()
            );
        }
        FilterIndices { indices }
    }

    /// Restrict every row to the columns in `filter`.
    fn filter_logprobs(
        &self,
        generations: &[SampleGeneration],
        filter: &FilterIndices,
    ) -> Vec<LogProbRows> {
        generations
            .iter()
            .map(|generation| {
                generation
                    .log_probs
                    .iter()
                    .map(|row| {
                        filter
                            .indices
                            .iter()
                            .map(|&id| row.get(id).copied().unwrap_or(f32::NEG_INFINITY))
                            .collect()
                    })
                    .collect()
            })
            .collect()
    }

    /// Best-effort hook letting a backend shrink its output layer to the
    /// subset. No return contract.
    fn optimize_top_layer(&self, _subset: &VocabSubset) {}
}

/// Whitespace-tokenize `label` against `vocab`. Every word must be a regular
/// vocabulary entry; the reserved mask and unknown tokens never match.
pub(crate) fn word_ids(vocab: &Vocabulary, label: &str) -> Option<Vec<usize>> {
    let ids: Option<Vec<usize>> = label
        .split_whitespace()
        .map(|word| {
            if word == MASK || word == UNK {
                None
            } else {
                vocab.id(word)
            }
        })
        .collect();
    ids.filter(|ids| !ids.is_empty())
}

/// Whitespace-tokenize the space-joined sentences of one sample, mapping
/// unknown words to `unk`. Returns the ids and the mask positions.
pub(crate) fn encode_sentences(
    vocab: &Vocabulary,
    sentences: &[String],
    unk: usize,
) -> (Vec<usize>, Vec<usize>) {
    let mut token_ids = Vec::new();
    let mut masked_positions = Vec::new();
    for word in sentences.iter().flat_map(|s| s.split_whitespace()) {
        if word == MASK {
            masked_positions.push(token_ids.len());
        }
        token_ids.push(vocab.id(word).unwrap_or(unk));
    }
    (token_ids, masked_positions)
}
