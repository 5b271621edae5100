//! Scripted language model for tests.

use super::{encode_sentences, word_ids, LanguageModel, SampleGeneration, UNK};
use crate::vocab::Vocabulary;
use crate::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};

/// A mock language model with scripted distributions.
///
/// Without rules, every masked position receives the same strictly
/// decreasing row, so the first vocabulary token is always the top
/// prediction. Rules override the row for samples whose joined sentences
/// contain a pattern; the first matching rule wins.
///
/// # Example
///
/// ```rust
/// use factprobe::backends::{LanguageModel, MockLanguageModel};
///
/// let model = MockLanguageModel::new("mock", ["[MASK]", "Paris", "Rome"])
///     .predicting("Dante", "Rome");
///
/// let batch = vec![vec!["Dante was born in [MASK] .".to_string()]];
/// let generations = model.get_batch_generation(&batch).unwrap();
/// assert_eq!(generations[0].masked_positions, vec![4]);
/// assert_eq!(generations[0].log_probs[0][2], 0.0);
/// ```
#[derive(Debug)]
pub struct MockLanguageModel {
    name: String,
    vocab: Vocabulary,
    default_row: Vec<f32>,
    rules: Vec<(String, Vec<f32>)>,
    calls: AtomicUsize,
}

impl MockLanguageModel {
    /// Create a mock over exactly the given tokens.
    pub fn new<I, S>(name: impl Into<String>, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let vocab = Vocabulary::new(tokens);
        let default_row = (0..vocab.len()).map(|i| -(i as f32) - 1.0).collect();
        Self {
            name: name.into(),
            vocab,
            default_row,
            rules: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Make `token` the top prediction for samples containing `pattern`.
    ///
    /// Unknown tokens leave the model unchanged.
    #[must_use]
    pub fn predicting(mut self, pattern: impl Into<String>, token: &str) -> Self {
        if let Some(id) = self.vocab.id(token) {
            let mut row = self.default_row.clone();
            row[id] = 0.0;
            self.rules.push((pattern.into(), row));
        }
        self
    }

    /// Use `row` verbatim for samples containing `pattern`.
    ///
    /// A row whose length differs from the vocabulary makes generation fail.
    #[must_use]
    pub fn with_row(mut self, pattern: impl Into<String>, row: Vec<f32>) -> Self {
        self.rules.push((pattern.into(), row));
        self
    }

    /// Number of `get_batch_generation` calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn row_for(&self, text: &str) -> &[f32] {
        self.rules
            .iter()
            .find(|(pattern, _)| text.contains(pattern.as_str()))
            .map(|(_, row)| row.as_slice())
            .unwrap_or(&self.default_row)
    }
}

impl LanguageModel for MockLanguageModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    fn get_id(&self, label: &str) -> Option<Vec<usize>> {
        word_ids(&self.vocab, label)
    }

    fn get_batch_generation(&self, batch: &[Vec<String>]) -> Result<Vec<SampleGeneration>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let unk = self.vocab.id(UNK).unwrap_or(0);
        batch
            .iter()
            .map(|sentences| {
                let (token_ids, masked_positions) = encode_sentences(&self.vocab, sentences, unk);
                let row = self.row_for(&sentences.join(" "));
                if row.len() != self.vocab.len() {
                    return Err(Error::inference(format!(
                        "scripted row has {} entries for a vocabulary of {}",
                        row.len(),
                        self.vocab.len()
                    )));
                }
                let log_probs = masked_positions.iter().map(|_| row.to_vec()).collect();
                Ok(SampleGeneration {
                    log_probs,
                    token_ids,
                    masked_positions,
                })
            })
            .collect()
    }
}
