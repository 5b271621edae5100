//! Probe store: loading JSON-lines probe datasets.
//!
//! One probe per line, in the LAMA layout:
//!
//! ```text
//! {"sub_label": "Dante", "obj_label": "Florence",
//!  "masked_sentences": ["Dante was born in [MASK] ."], "uuid": "..."}
//! ```
//!
//! Google-RE style probes also carry `judgments`; T-REx style probes carry
//! `evidences` with surface forms; negated variants carry `negated`.

use crate::probe::{RawProbe, MASK};
use crate::{Error, Result};
use std::fmt;
use std::path::Path;

/// Parse JSON-lines content. Blank lines are skipped; the first malformed
/// line fails the whole load with its line number.
pub fn parse_probes(content: &str) -> Result<Vec<RawProbe>> {
    let mut probes = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let probe: RawProbe = serde_json::from_str(line)
            .map_err(|e| Error::dataset(format!("line {}: {}", lineno + 1, e)))?;
        probes.push(probe);
    }
    Ok(probes)
}

/// Load a JSON-lines probe file.
pub fn load_probes(path: impl AsRef<Path>) -> Result<Vec<RawProbe>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::dataset(format!("Failed to read {}: {}", path.display(), e)))?;
    let probes = parse_probes(&content)
        .map_err(|e| Error::dataset(format!("{}: {}", path.display(), e)))?;
    log::info!("loaded {} probes from {}", probes.len(), path.display());
    Ok(probes)
}

/// Lowercase labels and sentences, keeping the mask marker upper-case.
///
/// Negated sentences are only touched when `use_negated_probes` is set.
pub fn lowercase_probes(probes: &[RawProbe], use_negated_probes: bool) -> Vec<RawProbe> {
    let lower_mask = MASK.to_lowercase();
    let lower = |sentence: &str| sentence.to_lowercase().replace(&lower_mask, MASK);

    probes
        .iter()
        .map(|probe| {
            let mut probe = probe.clone();
            probe.subject_label = probe.subject_label.map(|s| s.to_lowercase());
            probe.object_label = probe.object_label.map(|s| s.to_lowercase());
            probe.masked_sentences = probe.masked_sentences.iter().map(|s| lower(s)).collect();
            if use_negated_probes {
                probe.negated = probe
                    .negated
                    .map(|negated| negated.iter().map(|s| lower(s)).collect());
            }
            probe
        })
        .collect()
}

/// Summary of a dataset file, produced without a model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetReport {
    /// Non-blank lines
    pub lines: usize,
    /// Lines that parsed as probes
    pub probes: usize,
    /// Probes with both labels
    pub labelled: usize,
    /// Probes with evidences
    pub with_evidences: usize,
    /// Probes with negated sentences
    pub with_negated: usize,
    /// Probes with judgments
    pub with_judgments: usize,
    /// Distinct object labels
    pub distinct_objects: usize,
    /// `(line number, error)` for every malformed line
    pub malformed: Vec<(usize, String)>,
}

impl DatasetReport {
    /// Inspect JSON-lines content, collecting every malformed line instead
    /// of stopping at the first.
    pub fn inspect(content: &str) -> Self {
        let mut report = Self::default();
        let mut objects = std::collections::HashSet::new();
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            report.lines += 1;
            match serde_json::from_str::<RawProbe>(line) {
                Ok(probe) => {
                    report.probes += 1;
                    if probe.subject_label.is_some() && probe.object_label.is_some() {
                        report.labelled += 1;
                    }
                    if probe.evidences.is_some() {
                        report.with_evidences += 1;
                    }
                    if probe.negated.is_some() {
                        report.with_negated += 1;
                    }
                    if probe.judgments.is_some() {
                        report.with_judgments += 1;
                    }
                    if let Some(object) = probe.object_label {
                        objects.insert(object);
                    }
                }
                Err(e) => report.malformed.push((lineno + 1, e.to_string())),
            }
        }
        report.distinct_objects = objects.len();
        report
    }

    /// Whether every line parsed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.malformed.is_empty()
    }
}

impl fmt::Display for DatasetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "lines: {}", self.lines)?;
        writeln!(f, "probes: {}", self.probes)?;
        writeln!(f, "with both labels: {}", self.labelled)?;
        writeln!(f, "with evidences: {}", self.with_evidences)?;
        writeln!(f, "with negated: {}", self.with_negated)?;
        writeln!(f, "with judgments: {}", self.with_judgments)?;
        writeln!(f, "distinct objects: {}", self.distinct_objects)?;
        for (line, err) in &self.malformed {
            writeln!(f, "malformed line {}: {}", line, err)?;
        }
        Ok(())
    }
}
