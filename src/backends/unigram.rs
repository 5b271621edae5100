//! Frequency-prior baseline.
//!
//! Ignores the input entirely: every masked position receives the smoothed
//! unigram distribution of the training counts. Scoring probes with it gives
//! the "predict the most frequent object" baseline that context-sensitive
//! models must beat.

use super::{encode_sentences, word_ids, LanguageModel, SampleGeneration, UNK};
use crate::probe::MASK;
use crate::vocab::Vocabulary;
use crate::{Error, Result};
use std::path::Path;

/// Unigram language model over a `token<TAB>count` file.
#[derive(Debug, Clone)]
pub struct UnigramModel {
    vocab: Vocabulary,
    row: Vec<f32>,
}

impl UnigramModel {
    /// Build from `(token, count)` pairs. Counts are add-one smoothed; the
    /// reserved `[MASK]` and `[UNK]` tokens (ids 0 and 1) are never predicted.
    pub fn from_counts<I, S>(counts: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let mut tokens = vec![MASK.to_string(), UNK.to_string()];
        let mut raw = vec![0u64, 0u64];
        for (token, count) in counts {
            let token = token.into();
            if token == MASK || token == UNK {
                continue;
            }
            tokens.push(token);
            raw.push(count);
        }
        if tokens.len() == 2 {
            return Err(Error::invalid_input("unigram counts are empty"));
        }

        let vocab = Vocabulary::new(tokens);
        let regular = (raw.len() - 2) as f64;
        let total: f64 = raw.iter().skip(2).map(|&c| c as f64).sum::<f64>() + regular;
        let row = raw
            .iter()
            .enumerate()
            .map(|(id, &count)| {
                if id < 2 {
                    f32::NEG_INFINITY
                } else {
                    ((count as f64 + 1.0) / total).ln() as f32
                }
            })
            .collect();
        Ok(Self { vocab, row })
    }

    /// Parse `token<TAB>count` lines. Blank lines and `#` comments are
    /// skipped.
    pub fn parse(content: &str) -> Result<Self> {
        let mut counts = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim_end();
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let (token, count) = line.split_once('\t').ok_or_else(|| {
                Error::dataset(format!(
                    "line {}: expected token<TAB>count, got {:?}",
                    lineno + 1,
                    line
                ))
            })?;
            let count: u64 = count.trim().parse().map_err(|e| {
                Error::dataset(format!("line {}: bad count {:?}: {}", lineno + 1, count, e))
            })?;
            counts.push((token.to_string(), count));
        }
        Self::from_counts(counts)
    }

    /// Load a counts file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::dataset(format!("Failed to read counts {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }
}

impl LanguageModel for UnigramModel {
    fn name(&self) -> &str {
        "unigram"
    }

    fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    fn get_id(&self, label: &str) -> Option<Vec<usize>> {
        word_ids(&self.vocab, label)
    }

    fn get_batch_generation(&self, batch: &[Vec<String>]) -> Result<Vec<SampleGeneration>> {
        let unk = self.vocab.id(UNK).unwrap_or(1);
        Ok(batch
            .iter()
            .map(|sentences| {
                let (token_ids, masked_positions) = encode_sentences(&self.vocab, sentences, unk);
                SampleGeneration {
                    log_probs: masked_positions.iter().map(|_| self.row.clone()).collect(),
                    token_ids,
                    masked_positions,
                }
            })
            .collect())
    }
}
