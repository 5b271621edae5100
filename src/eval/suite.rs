//! Per-relation suites.
//!
//! A relations file lists one relation per line:
//!
//! ```text
//! {"relation": "P19", "template": "[X] was born in [Y] .", "dataset": "P19.jsonl"}
//! ```
//!
//! Each relation runs the full pipeline with its own template and dataset
//! into `<logdir>/<relation>/`. Relative dataset paths resolve against the
//! relations file's directory.

use super::aggregate::EvaluationSummary;
use super::config::ProbeConfig;
use super::ranking::Ranker;
use super::rundir::{prepare_run_dir, write_args};
use super::runner::run_evaluation;
use crate::backends::LanguageModel;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// One relation of a suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationSpec {
    /// Relation identifier, e.g. `P19`; also the run directory name
    pub relation: String,
    /// Template for the relation
    pub template: String,
    /// Negated template
    #[serde(default)]
    pub template_negated: Option<String>,
    /// Probe file
    pub dataset: PathBuf,
}

/// Parse a JSON-lines relations file.
pub fn parse_relations(content: &str, base_dir: &Path) -> Result<Vec<RelationSpec>> {
    let mut relations = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut entry: RelationSpec = serde_json::from_str(line)
            .map_err(|e| Error::dataset(format!("line {}: {}", lineno + 1, e)))?;
        if entry.dataset.is_relative() {
            entry.dataset = base_dir.join(&entry.dataset);
        }
        relations.push(entry);
    }
    Ok(relations)
}

/// Load a relations file.
pub fn load_relations(path: impl AsRef<Path>) -> Result<Vec<RelationSpec>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::dataset(format!("Failed to read {}: {}", path.display(), e)))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    parse_relations(&content, base_dir)
}

/// Results of a suite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuiteReport {
    /// `(relation, summary)` in suite order
    pub relations: Vec<(String, EvaluationSummary)>,
}

impl SuiteReport {
    /// Mean P@1 over the relations that have one.
    #[must_use]
    pub fn mean_precision_at_1(&self) -> Option<f64> {
        let values: Vec<f64> = self
            .relations
            .iter()
            .filter_map(|(_, s)| s.precision_at_1)
            .collect();
        (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<12}{:>8}{:>10}{:>10}{:>10}", "relation", "samples", "MRR", "P@10", "P@1")?;
        let cell = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{:.4}", v));
        for (relation, s) in &self.relations {
            writeln!(
                f,
                "{:<12}{:>8}{:>10}{:>10}{:>10}",
                relation,
                s.results,
                cell(s.mrr),
                cell(s.precision_at_10),
                cell(s.precision_at_1)
            )?;
        }
        write!(f, "mean P@1: {}", cell(self.mean_precision_at_1()))
    }
}

/// Run every relation in order. The first failing relation aborts the suite.
pub fn run_suite(
    base: &ProbeConfig,
    relations: &[RelationSpec],
    model: &dyn LanguageModel,
    ranker: &dyn Ranker,
) -> Result<SuiteReport> {
    let mut report = SuiteReport {
        relations: Vec::with_capacity(relations.len()),
    };
    for entry in relations {
        log::info!("relation {}: {}", entry.relation, entry.template);
        let mut config = base.clone();
        config.template = Some(entry.template.clone());
        config.template_negated = entry.template_negated.clone();
        config.dataset = entry.dataset.clone();
        config.full_logdir = Some(base.logdir.join(&entry.relation));

        let dir = prepare_run_dir(&config, &model.run_name())?;
        write_args(&dir, &config)?;
        let run = run_evaluation(&config, model, ranker)?;
        report.relations.push((entry.relation.clone(), run.summary));
    }
    Ok(report)
}
