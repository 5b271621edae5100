//! Ranking metrics for a single sample.
//!
//! The [`Ranker`] trait is the seam between the metrics engine and the
//! metric definitions. [`LogProbRanker`] is the standard implementation:
//!
//! - **MRR**: `1 / rank` of the object label among the top-k predictions at
//!   the first masked position, 0 when it falls outside the top-k.
//! - **P@10** / **P@1**: whether that rank is within 10 / exactly 1.
//! - **Negation**: overlap of the affirmative and negated argmax, and the
//!   Spearman rank correlation of the two distributions.

use crate::backends::{FilterIndices, LogProbRows};
use crate::vocab::Vocabulary;
use crate::{Error, Result};
use serde::Serialize;
use std::fmt::Write as _;

/// Predictions shown in logs and kept in results.
pub const DISPLAYED_PREDICTIONS: usize = 10;

/// Rank cut-off for precision@10.
pub const P_AT: usize = 10;

/// One entry of the ranked prediction list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// 0-based position in the ranking
    pub rank: usize,
    /// Vocabulary id
    pub token_index: usize,
    /// Token string
    pub token_word_form: String,
    /// Log-probability
    pub log_prob: f32,
}

/// Ranking metrics for one sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingResult {
    /// Reciprocal rank of the label, 0 outside the top-k
    pub mrr: f64,
    /// 1 if the label ranks within the first 10
    pub precision_at_10: f64,
    /// 1 if the label ranks first
    pub precision_at_1: f64,
    /// 1-based rank of the label within the top-k
    pub rank: Option<usize>,
    /// Best predictions, most likely first
    pub topk: Vec<Prediction>,
    /// Log-probability of the label
    pub label_log_prob: Option<f32>,
    /// Human-readable prediction table
    #[serde(skip)]
    pub log_text: String,
}

impl RankingResult {
    /// The top prediction.
    #[must_use]
    pub fn top(&self) -> Option<&Prediction> {
        self.topk.first()
    }
}

/// Negation-consistency metrics for one sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NegationResult {
    /// 1 if affirmative and negated argmax agree, NaN if undefined
    pub overlap_at_1: f64,
    /// Spearman correlation of the two distributions, NaN if undefined
    pub correlation: f64,
    /// Diagnostics
    #[serde(skip)]
    pub log_text: String,
}

impl NegationResult {
    /// Result for a sample without a negated masked token.
    #[must_use]
    pub fn undefined() -> Self {
        Self {
            overlap_at_1: f64::NAN,
            correlation: f64::NAN,
            log_text: String::new(),
        }
    }

    /// Whether the correlation is a number and the result counts.
    #[must_use]
    pub fn is_defined(&self) -> bool {
        !self.correlation.is_nan()
    }
}

/// Inputs for ranking one sample.
#[derive(Debug, Clone, Copy)]
pub struct RankQuery<'a> {
    /// Rows for the masked positions (filtered when `index_list` is set)
    pub log_probs: &'a LogProbRows,
    /// Masked positions of the input
    pub masked_positions: &'a [usize],
    /// Model vocabulary
    pub vocab: &'a Vocabulary,
    /// Vocabulary id of the object label
    pub label_index: usize,
    /// Column-to-id mapping of filtered rows
    pub index_list: Option<&'a FilterIndices>,
    /// Ranking depth
    pub top_k: usize,
}

/// Inputs for the negation metrics of one sample.
#[derive(Debug, Clone, Copy)]
pub struct NegationQuery<'a> {
    /// Affirmative rows
    pub log_probs: &'a LogProbRows,
    /// Affirmative masked positions
    pub masked_positions: &'a [usize],
    /// Negated rows
    pub log_probs_negated: &'a LogProbRows,
    /// Negated masked positions
    pub masked_positions_negated: &'a [usize],
}

/// Computes per-sample metrics. Called from worker threads.
pub trait Ranker: Send + Sync {
    /// Rank the object label.
    fn rank(&self, query: &RankQuery<'_>) -> Result<RankingResult>;

    /// Compare affirmative and negated distributions.
    fn negation(&self, query: &NegationQuery<'_>) -> NegationResult;
}

/// Ranking over log-probabilities at the first masked position.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProbRanker;

impl LogProbRanker {
    /// Create the ranker.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Column indices of `row`, most likely first. Ties keep the lower index.
fn descending_order(row: &[f32]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..row.len()).collect();
    order.sort_by(|&a, &b| row[b].total_cmp(&row[a]));
    order
}

fn argmax(row: &[f32]) -> Option<usize> {
    row.iter()
        .enumerate()
        .max_by(|(ia, a), (ib, b)| a.total_cmp(b).then_with(|| ib.cmp(ia)))
        .map(|(i, _)| i)
}

impl Ranker for LogProbRanker {
    fn rank(&self, query: &RankQuery<'_>) -> Result<RankingResult> {
        if query.masked_positions.is_empty() {
            return Err(Error::inference("sample has no masked token"));
        }
        let row = query
            .log_probs
            .first()
            .ok_or_else(|| Error::inference("no log-probabilities for the masked token"))?;

        let column = match query.index_list {
            Some(filter) => filter.position(query.label_index).ok_or_else(|| {
                Error::vocabulary_mismatch(
                    query.vocab.get(query.label_index).unwrap_or("<unknown>"),
                    "not in the filtered vocabulary",
                )
            })?,
            None => query.label_index,
        };

        let order = descending_order(row);
        let depth = query.top_k.min(order.len());
        let rank = order[..depth].iter().position(|&c| c == column).map(|p| p + 1);

        let mut log_text = String::new();
        let topk: Vec<Prediction> = order
            .iter()
            .take(DISPLAYED_PREDICTIONS.min(depth))
            .enumerate()
            .map(|(i, &c)| {
                let token_index = query
                    .index_list
                    .and_then(|f| f.indices.get(c).copied())
                    .unwrap_or(c);
                let token_word_form = query.vocab.get(token_index).unwrap_or("").to_string();
                let _ = writeln!(
                    log_text,
                    "{:<8}{:<20}{:<12.3}",
                    i, token_word_form, row[c]
                );
                Prediction {
                    rank: i,
                    token_index,
                    token_word_form,
                    log_prob: row[c],
                }
            })
            .collect();

        let (mrr, precision_at_10, precision_at_1) = match rank {
            Some(r) => (
                1.0 / r as f64,
                if r <= P_AT { 1.0 } else { 0.0 },
                if r == 1 { 1.0 } else { 0.0 },
            ),
            None => (0.0, 0.0, 0.0),
        };

        Ok(RankingResult {
            mrr,
            precision_at_10,
            precision_at_1,
            rank,
            topk,
            label_log_prob: row.get(column).copied(),
            log_text,
        })
    }

    fn negation(&self, query: &NegationQuery<'_>) -> NegationResult {
        if query.masked_positions_negated.is_empty() || query.masked_positions.is_empty() {
            return NegationResult::undefined();
        }
        let (Some(affirmative), Some(negated)) =
            (query.log_probs.first(), query.log_probs_negated.first())
        else {
            return NegationResult::undefined();
        };

        let overlap_at_1 = match (argmax(affirmative), argmax(negated)) {
            (Some(a), Some(b)) if a == b => 1.0,
            (Some(_), Some(_)) => 0.0,
            _ => f64::NAN,
        };
        let correlation = spearman(affirmative, negated);
        NegationResult {
            overlap_at_1,
            correlation,
            log_text: format!("overlap@1: {} spearman: {:.4}", overlap_at_1, correlation),
        }
    }
}

/// 1-based ranks of `values`; ties share their average rank.
#[must_use]
pub fn average_ranks(values: &[f32]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end hold ranks start+1..=end
        let rank = (start + 1 + end) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = rank;
        }
        start = end;
    }
    ranks
}

/// Spearman rank correlation. NaN for mismatched lengths, fewer than two
/// values, or a constant input.
#[must_use]
pub fn spearman(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.len() < 2 {
        return f64::NAN;
    }
    let ra = average_ranks(a);
    let rb = average_ranks(b);
    let n = ra.len() as f64;
    let mean_a = ra.iter().sum::<f64>() / n;
    let mean_b = rb.iter().sum::<f64>() / n;

    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in ra.iter().zip(&rb) {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a == 0.0 || var_b == 0.0 {
        return f64::NAN;
    }
    (cov / (var_a * var_b).sqrt()).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> Vocabulary {
        Vocabulary::new(["a", "b", "c", "d"])
    }

    fn query<'a>(rows: &'a LogProbRows, vocab: &'a Vocabulary, label: usize) -> RankQuery<'a> {
        RankQuery {
            log_probs: rows,
            masked_positions: &[3],
            vocab,
            label_index: label,
            index_list: None,
            top_k: 10_000,
        }
    }

    #[test]
    fn test_rank_first() {
        let v = vocab();
        let rows = vec![vec![-3.0, -0.5, -2.0, -1.0]];
        let result = LogProbRanker.rank(&query(&rows, &v, 1)).unwrap();
        assert_eq!(result.rank, Some(1));
        assert_eq!(result.mrr, 1.0);
        assert_eq!(result.precision_at_1, 1.0);
        assert_eq!(result.precision_at_10, 1.0);
        assert_eq!(result.top().unwrap().token_word_form, "b");
        assert_eq!(result.label_log_prob, Some(-0.5));
    }

    #[test]
    fn test_rank_third() {
        let v = vocab();
        let rows = vec![vec![-3.0, -0.5, -2.0, -1.0]];
        let result = LogProbRanker.rank(&query(&rows, &v, 2)).unwrap();
        assert_eq!(result.rank, Some(3));
        assert!((result.mrr - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(result.precision_at_1, 0.0);
        assert_eq!(result.precision_at_10, 1.0);
    }

    #[test]
    fn test_outside_topk() {
        let v = vocab();
        let rows = vec![vec![-3.0, -0.5, -2.0, -1.0]];
        let mut q = query(&rows, &v, 0);
        q.top_k = 2;
        let result = LogProbRanker.rank(&q).unwrap();
        assert_eq!(result.rank, None);
        assert_eq!(result.mrr, 0.0);
        assert_eq!(result.topk.len(), 2);
        // still reported
        assert_eq!(result.label_log_prob, Some(-3.0));
    }

    #[test]
    fn test_filtered_label_translated() {
        let v = vocab();
        let filter = FilterIndices {
            indices: vec![3, 0],
        };
        // columns: d, a
        let rows = vec![vec![-2.0, -1.0]];
        let mut q = query(&rows, &v, 0);
        q.index_list = Some(&filter);
        let result = LogProbRanker.rank(&q).unwrap();
        assert_eq!(result.rank, Some(1));
        assert_eq!(result.topk[0].token_index, 0);
        assert_eq!(result.topk[1].token_word_form, "d");

        q.label_index = 1;
        assert!(matches!(
            LogProbRanker.rank(&q),
            Err(Error::VocabularyMismatch { .. })
        ));
    }

    #[test]
    fn test_no_mask_is_error() {
        let v = vocab();
        let rows: LogProbRows = vec![];
        let mut q = query(&rows, &v, 0);
        q.masked_positions = &[];
        assert!(LogProbRanker.rank(&q).is_err());
    }

    #[test]
    fn test_negation_identical_rows() {
        let rows = vec![vec![-1.0, -2.0, -3.0]];
        let result = LogProbRanker.negation(&NegationQuery {
            log_probs: &rows,
            masked_positions: &[0],
            log_probs_negated: &rows,
            masked_positions_negated: &[0],
        });
        assert_eq!(result.overlap_at_1, 1.0);
        assert!((result.correlation - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_negation_without_negated_mask() {
        let rows = vec![vec![-1.0, -2.0]];
        let empty: LogProbRows = vec![];
        let result = LogProbRanker.negation(&NegationQuery {
            log_probs: &rows,
            masked_positions: &[0],
            log_probs_negated: &empty,
            masked_positions_negated: &[],
        });
        assert!(result.overlap_at_1.is_nan());
        assert!(!result.is_defined());
    }

    #[test]
    fn test_spearman() {
        assert!((spearman(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]) + 1.0).abs() < 1e-12);
        assert!(spearman(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_nan());
        assert!(spearman(&[1.0], &[1.0]).is_nan());
        assert_eq!(average_ranks(&[10.0, 20.0, 10.0]), vec![1.5, 3.0, 1.5]);
    }
}
