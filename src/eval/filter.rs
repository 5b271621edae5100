//! Sample filter: which probes can be scored fairly against a model.
//!
//! A probe survives only if its object label is something the model can
//! actually emit: it tokenizes, and decoding the tokens gives back exactly
//! the label. Probes that are too long (when not templated), whose object
//! falls outside the common vocabulary, or whose annotators did not back
//! the relation are dropped as well.
//!
//! Rules are checked in this order and a probe is excluded for the first
//! one it fails:
//!
//! | # | Rule | Applies when |
//! |---|------|--------------|
//! | 1 | both labels present | always |
//! | 2 | `masked_sentences` ≤ `max_sentence_length` words | no template |
//! | 3 | some sentence holds the mask marker | no template |
//! | 4 | every object word in the subset | vocabulary subset |
//! | 5 | object label tokenizes | always |
//! | 6 | decoded tokens == object label | always |
//! | 7 | `yes` votes outnumber `no` votes | judgments present |

use crate::backends::LanguageModel;
use crate::probe::{FilteredProbe, JudgmentTally, ProbeId, RawProbe, MASK};
use crate::vocab::VocabSubset;
use std::fmt;

/// Filter settings.
#[derive(Debug, Clone, Copy)]
pub struct FilterOptions<'a> {
    /// Common vocabulary restriction
    pub vocab_subset: Option<&'a VocabSubset>,
    /// Word limit on the concatenated masked sentences
    pub max_sentence_length: usize,
    /// Template; when set the probe's own sentences are not length-checked
    pub template: Option<&'a str>,
}

impl Default for FilterOptions<'_> {
    fn default() -> Self {
        Self {
            vocab_subset: None,
            max_sentence_length: 100,
            template: None,
        }
    }
}

/// Why a probe was excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionReason {
    /// `sub_label` or `obj_label` is missing
    MissingLabels,
    /// Masked sentences exceed the word limit
    TooLong {
        /// Words in the concatenated sentences
        words: usize,
        /// Configured limit
        max: usize,
    },
    /// No masked sentence contains the mask marker
    NoMask,
    /// A word of the object label is outside the vocabulary subset
    OutsideVocabSubset {
        /// The first offending word
        word: String,
    },
    /// The model could not tokenize the object label
    NotTokenizable,
    /// Decoding the object label's tokens gave a different string
    RoundTripMismatch {
        /// What the tokens decode to
        reconstructed: String,
    },
    /// Annotators did not support the relation
    NegativeJudgment {
        /// `yes` votes
        yes: usize,
        /// `no` votes
        no: usize,
    },
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::MissingLabels => f.write_str("missing sub_label or obj_label"),
            ExclusionReason::TooLong { words, max } => {
                write!(f, "exceeding max sentence length ({} > {} words)", words, max)
            }
            ExclusionReason::NoMask => write!(f, "no {} in masked_sentences", MASK),
            ExclusionReason::OutsideVocabSubset { word } => {
                write!(f, "word {:?} not in vocab subset", word)
            }
            ExclusionReason::NotTokenizable => f.write_str("not in model vocabulary"),
            ExclusionReason::RoundTripMismatch { reconstructed } => write!(
                f,
                "not in model vocabulary (reconstructed as {:?})",
                reconstructed
            ),
            ExclusionReason::NegativeJudgment { yes, no } => {
                write!(f, "negative evidence ({} yes / {} no)", yes, no)
            }
        }
    }
}

/// One excluded probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusion {
    /// Position in the input
    pub position: usize,
    /// Probe uuid, if it had one
    pub uuid: Option<ProbeId>,
    /// Object label, if it had one
    pub object_label: Option<String>,
    /// Why
    pub reason: ExclusionReason,
}

/// Diagnostics produced by [`filter_probes`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterReport {
    /// Probes seen
    pub total: usize,
    /// Probes kept
    pub kept: usize,
    /// Every exclusion, in input order
    pub exclusions: Vec<Exclusion>,
}

impl FilterReport {
    /// Number of excluded probes.
    #[must_use]
    pub fn excluded(&self) -> usize {
        self.exclusions.len()
    }

    /// Exclusions whose reason matches `pred`.
    pub fn count_where(&self, pred: impl Fn(&ExclusionReason) -> bool) -> usize {
        self.exclusions.iter().filter(|e| pred(&e.reason)).count()
    }
}

impl fmt::Display for FilterReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for exclusion in &self.exclusions {
            writeln!(
                f,
                "\tEXCLUDED probe #{} (obj_label {}): {}",
                exclusion.position,
                exclusion.object_label.as_deref().unwrap_or("<none>"),
                exclusion.reason
            )?;
        }
        writeln!(f, "samples excluded: {}", self.excluded())?;
        write!(f, "samples kept: {} of {}", self.kept, self.total)
    }
}

/// Check one probe against the filter rules.
fn check(
    model: &dyn LanguageModel,
    probe: &RawProbe,
    options: &FilterOptions<'_>,
) -> Result<(), ExclusionReason> {
    let object = match (&probe.subject_label, &probe.object_label) {
        (Some(_), Some(object)) => object,
        _ => return Err(ExclusionReason::MissingLabels),
    };

    if options.template.is_none() {
        let words = crate::probe::word_count(&probe.masked_sentences);
        if words > options.max_sentence_length {
            return Err(ExclusionReason::TooLong {
                words,
                max: options.max_sentence_length,
            });
        }
        let masked = probe
            .masked_sentences
            .iter()
            .any(|s| s.split_whitespace().any(|w| w == MASK));
        if !masked {
            return Err(ExclusionReason::NoMask);
        }
    }

    if let Some(subset) = options.vocab_subset {
        if let Some(word) = object.split(' ').find(|w| !subset.contains(w)) {
            return Err(ExclusionReason::OutsideVocabSubset {
                word: word.to_string(),
            });
        }
    }

    let ids = match model.get_id(object) {
        Some(ids) if !ids.is_empty() => ids,
        _ => return Err(ExclusionReason::NotTokenizable),
    };
    match model.vocab().decode(&ids) {
        Some(reconstructed) if reconstructed == *object => {}
        reconstructed => {
            return Err(ExclusionReason::RoundTripMismatch {
                reconstructed: reconstructed.unwrap_or_default(),
            })
        }
    }

    if let Some(judgments) = &probe.judgments {
        let tally = JudgmentTally::of(judgments);
        if tally.is_negative() {
            return Err(ExclusionReason::NegativeJudgment {
                yes: tally.yes,
                no: tally.no,
            });
        }
    }

    Ok(())
}

/// Keep the probes that can be scored fairly against `model`.
///
/// Kept probes preserve input order. Running the filter again on its own
/// output excludes nothing.
pub fn filter_probes(
    model: &dyn LanguageModel,
    probes: Vec<RawProbe>,
    options: &FilterOptions<'_>,
) -> (Vec<FilteredProbe>, FilterReport) {
    let mut report = FilterReport {
        total: probes.len(),
        ..FilterReport::default()
    };
    let mut kept = Vec::with_capacity(probes.len());

    for (position, probe) in probes.into_iter().enumerate() {
        if let Err(reason) = check(model, &probe, options) {
            log::debug!(
                "EXCLUDED probe #{} (obj_label {:?}): {}",
                position,
                probe.object_label,
                reason
            );
            report.exclusions.push(Exclusion {
                position,
                uuid: probe.uuid,
                object_label: probe.object_label,
                reason,
            });
            continue;
        }
        let (Some(subject_label), Some(object_label)) = (probe.subject_label, probe.object_label)
        else {
            continue;
        };
        kept.push(FilteredProbe {
            subject_label,
            object_label,
            subject_uri: probe.subject_uri,
            object_uri: probe.object_uri,
            masked_sentences: probe.masked_sentences,
            evidences: probe.evidences,
            negated: probe.negated,
            judgments: probe.judgments,
            uuid: probe.uuid,
        });
    }

    report.kept = kept.len();
    log::info!(
        "filter kept {} of {} probes ({} excluded)",
        report.kept,
        report.total,
        report.excluded()
    );
    (kept, report)
}
