//! Batcher: grouping samples by length.
//!
//! Samples are stably sorted by the word count of their concatenated masked
//! sentences and chunked, so each batch holds similarly long inputs and
//! padding stays small. The negated batching uses the same order, so batch
//! `i` of both sides describes the same samples.

use crate::probe::Sample;
use crate::{Error, Result};

/// One batch of samples with the sentences sent to the model.
///
/// `sentences[j]` is always `samples[j].masked_sentences`.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Samples, in length order
    pub samples: Vec<Sample>,
    /// Model input, index-aligned with `samples`
    pub sentences: Vec<Vec<String>>,
}

impl Batch {
    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

fn check_size(batch_size: usize) -> Result<()> {
    if batch_size == 0 {
        return Err(Error::config("batch size must be at least 1"));
    }
    Ok(())
}

/// Indices of `samples` in ascending word-count order; ties keep input order.
fn length_order(samples: &[Sample]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..samples.len()).collect();
    order.sort_by_key(|&i| samples[i].word_count());
    order
}

/// Sort by length and chunk into batches of at most `batch_size`.
pub fn batchify(samples: &[Sample], batch_size: usize) -> Result<Vec<Batch>> {
    check_size(batch_size)?;
    let order = length_order(samples);
    let batches: Vec<Batch> = order
        .chunks(batch_size)
        .map(|chunk| {
            let samples: Vec<Sample> = chunk.iter().map(|&i| samples[i].clone()).collect();
            let sentences = samples.iter().map(|s| s.masked_sentences.clone()).collect();
            Batch { samples, sentences }
        })
        .collect();
    log::debug!(
        "{} samples in {} batches of up to {}",
        samples.len(),
        batches.len(),
        batch_size
    );
    Ok(batches)
}

/// Negated sentences in the same batch layout as [`batchify`].
///
/// Samples without negated sentences contribute `[""]`.
pub fn batchify_negated(samples: &[Sample], batch_size: usize) -> Result<Vec<Vec<Vec<String>>>> {
    check_size(batch_size)?;
    let order = length_order(samples);
    Ok(order
        .chunks(batch_size)
        .map(|chunk| {
            chunk
                .iter()
                .map(|&i| {
                    samples[i]
                        .negated
                        .clone()
                        .unwrap_or_else(|| vec![String::new()])
                })
                .collect()
        })
        .collect())
}

/// Whether a negated batch has nothing to score.
#[must_use]
pub fn is_empty_negated(batch: &[Vec<String>]) -> bool {
    batch
        .iter()
        .all(|sentences| sentences.first().map_or(true, |s| s.is_empty()))
}
