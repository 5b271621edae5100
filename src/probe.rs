//! Probe records at each stage of the pipeline.
//!
//! ```text
//! RawProbe ──filter──▶ FilteredProbe ──materialize──▶ Sample
//!                                 └──(no template)────▶ Sample
//! ```
//!
//! Raw probes are read straight from JSON lines and may be missing anything.
//! A [`FilteredProbe`] is guaranteed to have both labels and an object label
//! that round-trips through the model vocabulary. A [`Sample`] is what gets
//! batched and scored: it always has a uuid and concrete masked sentences.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Mask marker standing in for the hidden object.
pub const MASK: &str = "[MASK]";

/// Subject placeholder in templates.
pub const SUBJECT_PLACEHOLDER: &str = "[X]";

/// Object placeholder in templates.
pub const OBJECT_PLACEHOLDER: &str = "[Y]";

/// Probe identifier. Datasets use either strings or integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProbeId {
    /// Integer id (also used for positionally assigned ids)
    Index(u64),
    /// String id, e.g. a UUID
    Text(String),
}

impl fmt::Display for ProbeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeId::Index(i) => write!(f, "{}", i),
            ProbeId::Text(s) => f.write_str(s),
        }
    }
}

/// One supporting sentence for context-conditioned probing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Evidence {
    /// Surface form of the subject in this sentence
    pub sub_surface: String,
    /// Surface form of the object in this sentence
    pub obj_surface: String,
    /// The sentence, with the object replaced by the mask marker
    pub masked_sentence: String,
}

impl Evidence {
    /// Create an evidence triple.
    pub fn new(
        sub_surface: impl Into<String>,
        obj_surface: impl Into<String>,
        masked_sentence: impl Into<String>,
    ) -> Self {
        Self {
            sub_surface: sub_surface.into(),
            obj_surface: obj_surface.into(),
            masked_sentence: masked_sentence.into(),
        }
    }
}

/// An annotator vote on whether a sentence supports the relation.
///
/// Anything other than `yes` counts as a `no`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Judgment {
    /// The vote, normally `yes` or `no`
    pub judgment: String,
}

impl Judgment {
    /// A `yes` vote.
    pub fn yes() -> Self {
        Self {
            judgment: "yes".to_string(),
        }
    }

    /// A `no` vote.
    pub fn no() -> Self {
        Self {
            judgment: "no".to_string(),
        }
    }

    /// Whether this is a `yes` vote.
    #[must_use]
    pub fn is_yes(&self) -> bool {
        self.judgment == "yes"
    }
}

/// Yes/no vote counts over a probe's judgments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JudgmentTally {
    /// `yes` votes
    pub yes: usize,
    /// Non-`yes` votes
    pub no: usize,
}

impl JudgmentTally {
    /// Count votes.
    pub fn of(judgments: &[Judgment]) -> Self {
        let yes = judgments.iter().filter(|j| j.is_yes()).count();
        Self {
            yes,
            no: judgments.len() - yes,
        }
    }

    /// Majority-evidence rule: `no` votes outnumber or tie `yes` votes.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.no >= self.yes
    }
}

/// A probe exactly as it appears in the dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawProbe {
    /// Subject label
    #[serde(rename = "sub_label", default, skip_serializing_if = "Option::is_none")]
    pub subject_label: Option<String>,
    /// Object label (the prediction target)
    #[serde(rename = "obj_label", default, skip_serializing_if = "Option::is_none")]
    pub object_label: Option<String>,
    /// Subject URI
    #[serde(rename = "sub_uri", default, skip_serializing_if = "Option::is_none")]
    pub subject_uri: Option<String>,
    /// Object URI
    #[serde(rename = "obj_uri", default, skip_serializing_if = "Option::is_none")]
    pub object_uri: Option<String>,
    /// Sentences containing the mask marker
    #[serde(default)]
    pub masked_sentences: Vec<String>,
    /// Supporting evidence sentences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidences: Option<Vec<Evidence>>,
    /// Negated counterpart sentences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negated: Option<Vec<String>>,
    /// Annotator votes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judgments: Option<Vec<Judgment>>,
    /// Identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<ProbeId>,
}

impl RawProbe {
    /// Create a probe with labels and masked sentences.
    pub fn new<S: Into<String>>(
        subject_label: impl Into<String>,
        object_label: impl Into<String>,
        masked_sentences: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            subject_label: Some(subject_label.into()),
            object_label: Some(object_label.into()),
            masked_sentences: masked_sentences.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Attach evidences.
    #[must_use]
    pub fn with_evidences(mut self, evidences: Vec<Evidence>) -> Self {
        self.evidences = Some(evidences);
        self
    }

    /// Attach negated sentences.
    #[must_use]
    pub fn with_negated<S: Into<String>>(mut self, negated: impl IntoIterator<Item = S>) -> Self {
        self.negated = Some(negated.into_iter().map(Into::into).collect());
        self
    }

    /// Attach judgments.
    #[must_use]
    pub fn with_judgments(mut self, judgments: Vec<Judgment>) -> Self {
        self.judgments = Some(judgments);
        self
    }

    /// Attach a uuid.
    #[must_use]
    pub fn with_uuid(mut self, uuid: ProbeId) -> Self {
        self.uuid = Some(uuid);
        self
    }
}

/// A probe that passed the sample filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredProbe {
    /// Subject label
    pub subject_label: String,
    /// Object label; round-trips exactly through the model vocabulary
    pub object_label: String,
    /// Subject URI
    pub subject_uri: Option<String>,
    /// Object URI
    pub object_uri: Option<String>,
    /// Sentences containing the mask marker
    pub masked_sentences: Vec<String>,
    /// Supporting evidence sentences
    pub evidences: Option<Vec<Evidence>>,
    /// Negated counterpart sentences
    pub negated: Option<Vec<String>>,
    /// Annotator votes
    pub judgments: Option<Vec<Judgment>>,
    /// Identifier from the dataset, if any
    pub uuid: Option<ProbeId>,
}

impl From<FilteredProbe> for RawProbe {
    fn from(probe: FilteredProbe) -> Self {
        RawProbe {
            subject_label: Some(probe.subject_label),
            object_label: Some(probe.object_label),
            subject_uri: probe.subject_uri,
            object_uri: probe.object_uri,
            masked_sentences: probe.masked_sentences,
            evidences: probe.evidences,
            negated: probe.negated,
            judgments: probe.judgments,
            uuid: probe.uuid,
        }
    }
}

/// A fact instance derived from one or more probes in template mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fact {
    /// Subject label
    pub subject_label: String,
    /// Object label
    pub object_label: String,
    /// Supporting context (context mode only)
    pub context: Option<FactContext>,
}

/// Context attached to a fact in context mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FactContext {
    /// Surface form of the object as it appears in `sentence`
    pub object_surface: String,
    /// Evidence sentence with the mask filled by `object_surface`
    pub sentence: String,
}

/// A scorable unit: what gets batched and sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    /// Identifier, unique within the run
    pub uuid: ProbeId,
    /// Subject label
    pub subject_label: String,
    /// Object label
    pub object_label: String,
    /// Object surface form revealed by the context (context mode only)
    pub object_surface: Option<String>,
    /// Context sentence (context mode only)
    pub context: Option<String>,
    /// Sentences sent to the model
    pub masked_sentences: Vec<String>,
    /// Negated sentences sent to the model
    pub negated: Option<Vec<String>>,
    /// Annotator votes
    pub judgments: Option<Vec<Judgment>>,
}

impl Sample {
    /// Number of whitespace-delimited words across all masked sentences.
    #[must_use]
    pub fn word_count(&self) -> usize {
        word_count(&self.masked_sentences)
    }
}

/// Number of whitespace-delimited words in the space-joined sentences.
#[must_use]
pub fn word_count<S: AsRef<str>>(sentences: &[S]) -> usize {
    sentences
        .iter()
        .map(|s| s.as_ref().split_whitespace().count())
        .sum()
}

/// Turn filtered probes into samples without a template, keeping each
/// probe's own sentences. Probes without a uuid get their position, or the
/// next index no other probe already uses.
pub fn into_samples(probes: Vec<FilteredProbe>) -> Vec<Sample> {
    let mut taken: HashSet<u64> = probes
        .iter()
        .filter_map(|probe| match &probe.uuid {
            Some(ProbeId::Index(index)) => Some(*index),
            _ => None,
        })
        .collect();

    probes
        .into_iter()
        .enumerate()
        .map(|(position, probe)| {
            let uuid = probe.uuid.unwrap_or_else(|| {
                let mut index = position as u64;
                while taken.contains(&index) {
                    index += 1;
                }
                taken.insert(index);
                ProbeId::Index(index)
            });
            Sample {
                uuid,
                subject_label: probe.subject_label,
                object_label: probe.object_label,
                object_surface: None,
                context: None,
                masked_sentences: probe.masked_sentences,
                negated: probe.negated,
                judgments: probe.judgments,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_raw_probe() {
        let line = r#"{"sub_label": "Dante", "obj_label": "Florence", "masked_sentences": ["Dante was born in [MASK] ."], "uuid": "abc-1", "judgments": [{"judgment": "yes", "rater": "r1"}]}"#;
        let probe: RawProbe = serde_json::from_str(line).unwrap();
        assert_eq!(probe.subject_label.as_deref(), Some("Dante"));
        assert_eq!(probe.object_label.as_deref(), Some("Florence"));
        assert_eq!(probe.uuid, Some(ProbeId::Text("abc-1".into())));
        assert_eq!(probe.judgments.unwrap().len(), 1);
        assert!(probe.evidences.is_none());
    }

    #[test]
    fn test_numeric_uuid() {
        let probe: RawProbe = serde_json::from_str(r#"{"uuid": 7}"#).unwrap();
        assert_eq!(probe.uuid, Some(ProbeId::Index(7)));
        assert!(probe.masked_sentences.is_empty());
    }

    #[test]
    fn test_judgment_tally_ties_are_negative() {
        let tally = JudgmentTally::of(&[Judgment::yes(), Judgment::no()]);
        assert_eq!(tally, JudgmentTally { yes: 1, no: 1 });
        assert!(tally.is_negative());
        assert!(!JudgmentTally::of(&[Judgment::yes()]).is_negative());
        // Unknown votes count as no
        let odd = Judgment {
            judgment: "maybe".into(),
        };
        assert_eq!(JudgmentTally::of(&[odd]).no, 1);
    }

    #[test]
    fn test_word_count_joins_sentences() {
        assert_eq!(word_count(&["a b", "c  d e"]), 5);
        assert_eq!(word_count::<&str>(&[]), 0);
    }

    #[test]
    fn test_into_samples_assigns_missing_uuids() {
        let base = FilteredProbe {
            subject_label: "Dante".into(),
            object_label: "Florence".into(),
            subject_uri: None,
            object_uri: None,
            masked_sentences: vec!["Dante was born in [MASK] .".into()],
            evidences: None,
            negated: None,
            judgments: None,
            uuid: None,
        };
        let mut with_id = base.clone();
        with_id.uuid = Some(ProbeId::Text("x".into()));

        let samples = into_samples(vec![base, with_id]);
        assert_eq!(samples[0].uuid, ProbeId::Index(0));
        assert_eq!(samples[1].uuid, ProbeId::Text("x".into()));
    }

    #[test]
    fn test_into_samples_skips_taken_indices() {
        let dante = FilteredProbe {
            subject_label: "Dante".into(),
            object_label: "Florence".into(),
            subject_uri: None,
            object_uri: None,
            masked_sentences: vec!["Dante was born in [MASK] .".into()],
            evidences: None,
            negated: None,
            judgments: None,
            uuid: None,
        };
        let caesar = FilteredProbe {
            subject_label: "Caesar".into(),
            object_label: "Rome".into(),
            masked_sentences: vec!["Caesar was born in [MASK] .".into()],
            uuid: Some(ProbeId::Index(0)),
            ..dante.clone()
        };
        let mut virgil = dante.clone();
        virgil.subject_label = "Virgil".into();

        let samples = into_samples(vec![dante, caesar, virgil]);
        let ids: Vec<&ProbeId> = samples.iter().map(|s| &s.uuid).collect();
        assert_eq!(
            ids,
            [&ProbeId::Index(1), &ProbeId::Index(0), &ProbeId::Index(2)]
        );
    }
}
