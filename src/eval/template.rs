//! Template materializer: turning filtered probes into template samples.
//!
//! With a template such as `"[X] was born in [Y] ."`, each filtered probe
//! becomes a fact and each fact becomes one sample whose only sentence is
//! the filled template. The object placeholder always receives the mask
//! marker, never the object label.
//!
//! # Modes
//!
//! | Mode | Facts per probe | `masked_sentences` |
//! |------|-----------------|--------------------|
//! | plain | 1 | `[filled]` |
//! | context | 1 per distinct evidence | `[context, filled]` |
//! | context + synthetic | as context, with objects swapped | `[context', filled]` |
//!
//! Synthetic negatives are a control: every fact's object is replaced by a
//! randomly drawn different object (and one of its surface forms) inside
//! the context sentence, so a model that merely copies from the context is
//! rewarded for copying the wrong answer.

use crate::probe::{
    Fact, FactContext, FilteredProbe, ProbeId, Sample, MASK, OBJECT_PLACEHOLDER,
    SUBJECT_PLACEHOLDER,
};
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

// =============================================================================
// Filling
// =============================================================================

/// Fill `template` with `subject` and the mask marker.
///
/// Both the template and the subject are trimmed first.
#[must_use]
pub fn fill_template(template: &str, subject: &str) -> String {
    template
        .trim()
        .replace(SUBJECT_PLACEHOLDER, subject.trim())
        .replace(OBJECT_PLACEHOLDER, MASK)
}

/// Sentences for one sample: `[context, filled]` with a context, otherwise
/// `[filled]`.
#[must_use]
pub fn parse_template(template: &str, subject: &str, context: Option<&str>) -> Vec<String> {
    let filled = fill_template(template, subject);
    match context {
        Some(context) => vec![context.to_string(), filled],
        None => vec![filled],
    }
}

// =============================================================================
// Facts
// =============================================================================

/// Materializer settings.
#[derive(Debug, Clone, Copy)]
pub struct MaterializeOptions<'a> {
    /// Affirmative template
    pub template: &'a str,
    /// Negated template, set when negation probing is on
    pub template_negated: Option<&'a str>,
    /// One fact per evidence sentence
    pub use_context: bool,
    /// Swap objects for random wrong ones
    pub synthetic: bool,
    /// Evidence sentences above this many words are skipped
    pub max_sentence_length: usize,
    /// Seed for synthetic draws
    pub seed: u64,
}

/// Counters collected while materializing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    /// Filtered probes seen
    pub total_probes: usize,
    /// Probes without evidences (context mode)
    pub invalid_facts: usize,
    /// Evidence sentences skipped for length
    pub long_sentences: usize,
    /// Repeated evidence triples within one probe
    pub duplicate_sentences: usize,
    /// Facts produced
    pub facts: usize,
    /// Whether synthetic negatives were substituted
    pub synthetic: bool,
}

impl fmt::Display for MaterializeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total facts before: {}", self.total_probes)?;
        writeln!(f, "Invalid facts: {}", self.invalid_facts)?;
        writeln!(
            f,
            "Number of masked sentences that are too long: {}",
            self.long_sentences
        )?;
        writeln!(f, "Number of duplicate sentences: {}", self.duplicate_sentences)?;
        writeln!(f, "Total facts after: {}", self.facts)?;
        write!(f, "Distinct template facts: {}", self.facts)?;
        if self.synthetic {
            write!(f, " (synthetic)")?;
        }
        Ok(())
    }
}

/// Derive facts from filtered probes.
///
/// Outside context mode there is exactly one fact per probe. In context
/// mode every distinct `(sub_surface, obj_surface, masked_sentence)` of a
/// probe yields one fact whose context is the evidence sentence with the
/// mask replaced by the object surface form.
pub fn extract_facts(
    probes: &[FilteredProbe],
    use_context: bool,
    max_sentence_length: usize,
    report: &mut MaterializeReport,
) -> Vec<Fact> {
    report.total_probes = probes.len();
    let mut facts = Vec::with_capacity(probes.len());

    for probe in probes {
        if !use_context {
            facts.push(Fact {
                subject_label: probe.subject_label.clone(),
                object_label: probe.object_label.clone(),
                context: None,
            });
            continue;
        }

        let Some(evidences) = &probe.evidences else {
            report.invalid_facts += 1;
            continue;
        };

        let mut seen = HashSet::new();
        for evidence in evidences {
            if !seen.insert(evidence) {
                report.duplicate_sentences += 1;
                continue;
            }
            if evidence.masked_sentence.split_whitespace().count() > max_sentence_length {
                report.long_sentences += 1;
                continue;
            }
            facts.push(Fact {
                subject_label: probe.subject_label.clone(),
                object_label: probe.object_label.clone(),
                context: Some(FactContext {
                    object_surface: evidence.obj_surface.clone(),
                    sentence: evidence
                        .masked_sentence
                        .replace(MASK, &evidence.obj_surface),
                }),
            });
        }
    }

    report.facts = facts.len();
    facts
}

/// Replace every fact's object with a uniformly drawn different object.
///
/// Objects are grouped by label with all their surface forms; for each fact
/// a different label is drawn, then one of its surface forms, and that form
/// replaces the original surface form inside the context.
pub fn synthesize_negatives<R: Rng + ?Sized>(facts: &[Fact], rng: &mut R) -> Result<Vec<Fact>> {
    // BTreeMap keeps the draw order independent of hashing
    let mut surfaces: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for fact in facts {
        let context = fact.context.as_ref().ok_or_else(|| {
            Error::config("synthetic negatives require context-conditioned facts")
        })?;
        surfaces
            .entry(fact.object_label.as_str())
            .or_default()
            .push(context.object_surface.as_str());
    }

    if surfaces.len() < 2 {
        return Err(Error::degenerate(format!(
            "synthetic negatives need at least two distinct object labels, found {}",
            surfaces.len()
        )));
    }

    let mut synthetic = Vec::with_capacity(facts.len());
    for fact in facts {
        let Some(context) = fact.context.as_ref() else {
            continue;
        };
        let others: Vec<(&str, &Vec<&str>)> = surfaces
            .iter()
            .filter(|(label, _)| **label != fact.object_label)
            .map(|(label, forms)| (*label, forms))
            .collect();
        let (label, forms) = others[rng.gen_range(0..others.len())];
        let surface = forms[rng.gen_range(0..forms.len())];

        synthetic.push(Fact {
            subject_label: fact.subject_label.clone(),
            object_label: label.to_string(),
            context: Some(FactContext {
                object_surface: surface.to_string(),
                sentence: context.sentence.replace(&context.object_surface, surface),
            }),
        });
    }
    Ok(synthetic)
}

// =============================================================================
// Materialization
// =============================================================================

/// Expand filtered probes into template samples.
///
/// Sample uuids are positions in the output. Annotator judgments and the
/// probes' own sentences do not carry over to template samples.
pub fn materialize(
    probes: &[FilteredProbe],
    options: &MaterializeOptions<'_>,
) -> Result<(Vec<Sample>, MaterializeReport)> {
    if options.synthetic && !options.use_context {
        return Err(Error::config(
            "synthetic negatives require context-conditioned probing",
        ));
    }

    let mut report = MaterializeReport {
        synthetic: options.synthetic,
        ..MaterializeReport::default()
    };
    let mut facts = extract_facts(
        probes,
        options.use_context,
        options.max_sentence_length,
        &mut report,
    );
    if options.synthetic {
        let mut rng = StdRng::seed_from_u64(options.seed);
        facts = synthesize_negatives(&facts, &mut rng)?;
    }
    log::info!("{}", report);

    let samples = facts
        .into_iter()
        .enumerate()
        .map(|(position, fact)| {
            let (object_surface, context) = match fact.context {
                Some(c) => (Some(c.object_surface), Some(c.sentence)),
                None => (None, None),
            };
            let masked_sentences =
                parse_template(options.template, &fact.subject_label, context.as_deref());
            let negated = options
                .template_negated
                .map(|negated| parse_template(negated, &fact.subject_label, None));
            Sample {
                uuid: ProbeId::Index(position as u64),
                subject_label: fact.subject_label,
                object_label: fact.object_label,
                object_surface,
                context,
                masked_sentences,
                negated,
                judgments: None,
            }
        })
        .collect();

    Ok((samples, report))
}
