//! Model vocabularies and vocabulary subsets.
//!
//! A [`Vocabulary`] is the ordered, index-addressable token list a language
//! model scores over. A [`VocabSubset`] is the "common vocabulary" used to
//! compare models with different tokenizers on equal footing: probes whose
//! object falls outside it are excluded, and log-probabilities are restricted
//! to it before ranking.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Ordered token vocabulary of a language model.
///
/// Serialized as the plain token list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary {
    tokens: Vec<String>,
    index: HashMap<String, usize>,
}

impl From<Vec<String>> for Vocabulary {
    fn from(tokens: Vec<String>) -> Self {
        Self::new(tokens)
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(vocab: Vocabulary) -> Self {
        vocab.tokens
    }
}

impl Vocabulary {
    /// Build a vocabulary. The first occurrence of a duplicate token wins.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        let mut index = HashMap::with_capacity(tokens.len());
        for (id, token) in tokens.iter().enumerate() {
            index.entry(token.clone()).or_insert(id);
        }
        Self { tokens, index }
    }

    /// Token string for `id`.
    #[must_use]
    pub fn get(&self, id: usize) -> Option<&str> {
        self.tokens.get(id).map(String::as_str)
    }

    /// Id of `token`.
    #[must_use]
    pub fn id(&self, token: &str) -> Option<usize> {
        self.index.get(token).copied()
    }

    /// Whether `token` is in the vocabulary.
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.index.contains_key(token)
    }

    /// Number of tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the vocabulary is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Iterate tokens in id order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    /// Decode ids back to a single space-joined string.
    ///
    /// Returns `None` if any id is out of range.
    #[must_use]
    pub fn decode(&self, ids: &[usize]) -> Option<String> {
        let words: Option<Vec<&str>> = ids.iter().map(|&id| self.get(id)).collect();
        words.map(|w| w.join(" ").trim().to_string())
    }
}

/// A restricted vocabulary shared across the models under comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VocabSubset {
    tokens: Vec<String>,
    set: HashSet<String>,
}

impl VocabSubset {
    /// Build a subset from tokens, keeping first-seen order.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut subset = Self::default();
        for token in tokens {
            let token = token.into();
            if subset.set.insert(token.clone()) {
                subset.tokens.push(token);
            }
        }
        subset
    }

    /// Parse one token per line. Blank lines are ignored; surrounding
    /// whitespace is stripped.
    pub fn parse(content: &str) -> Self {
        Self::new(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty()),
        )
    }

    /// Load a subset file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::dataset(format!(
                "Failed to read vocabulary subset {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self::parse(&content))
    }

    /// Whether `token` is in the subset.
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.set.contains(token)
    }

    /// Tokens in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    /// Number of tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the subset is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
