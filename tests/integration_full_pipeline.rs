//! End-to-end probing runs against scripted models.
//!
//! Each test writes a small dataset to a temp dir, runs the whole pipeline
//! and checks the summary numbers by hand.

use factprobe::backends::MockLanguageModel;
use factprobe::eval::{
    batchify, Aggregator, EngineOptions, LogProbRanker, MetricsEngine, ProbeConfig,
};
use factprobe::{run_evaluation, Judgment, ProbeId, Sample};
use std::path::{Path, PathBuf};

const BORN_IN: &str = r#"{"sub_label": "Dante", "obj_label": "Florence", "masked_sentences": ["Dante was born in [MASK] ."], "evidences": [{"sub_surface": "Dante", "obj_surface": "Florence", "masked_sentence": "Dante Alighieri was born in [MASK] in 1265 ."}, {"sub_surface": "Dante", "obj_surface": "Florence", "masked_sentence": "Dante left [MASK] in 1302 ."}]}
{"sub_label": "Caesar", "obj_label": "Rome", "masked_sentences": ["Caesar was born in [MASK] ."], "evidences": [{"sub_surface": "Caesar", "obj_surface": "Rome", "masked_sentence": "Caesar was born in [MASK] ."}]}
{"sub_label": "Petrarch", "obj_label": "Arezzo", "masked_sentences": ["Petrarch was born in [MASK] ."], "evidences": [{"sub_surface": "Petrarch", "obj_surface": "Arezzo", "masked_sentence": "Petrarch was born in [MASK] ."}]}
{"sub_label": "Virgil", "obj_label": "Mantua", "masked_sentences": ["Virgil was born in [MASK] ."]}
"#;

const TOKENS: [&str; 7] = ["[MASK]", "[UNK]", "Rome", "Florence", "Arezzo", "Paris", "not"];

fn write_dataset(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("P19.jsonl");
    std::fs::write(&path, content).unwrap();
    path
}

fn model() -> MockLanguageModel {
    MockLanguageModel::new("mock", TOKENS)
        .predicting("Dante", "Florence")
        .predicting("Caesar", "Rome")
        .predicting("Petrarch", "Paris")
}

fn sample(uuid: u64, subject: &str, object: &str, votes: &[bool]) -> Sample {
    Sample {
        uuid: ProbeId::Index(uuid),
        subject_label: subject.to_string(),
        object_label: object.to_string(),
        object_surface: None,
        context: None,
        masked_sentences: vec![format!("{} was born in [MASK] .", subject)],
        negated: None,
        judgments: Some(
            votes
                .iter()
                .map(|&yes| if yes { Judgment::yes() } else { Judgment::no() })
                .collect(),
        ),
    }
}

// =============================================================================
// Plain and template runs
// =============================================================================

#[test]
fn plain_run_skips_untokenizable_objects() {
    let tmp = tempfile::tempdir().unwrap();
    let config = ProbeConfig::new(write_dataset(tmp.path(), BORN_IN)).with_batch_size(2);

    let run = run_evaluation(&config, &model(), &LogProbRanker).unwrap();

    // Mantua is not in the vocabulary
    assert_eq!(run.filter.total, 4);
    assert_eq!(run.filter.excluded(), 1);
    assert_eq!(run.summary.all_samples, 3);
    assert_eq!(run.summary.results, 3);

    let p1 = run.summary.precision_at_1.unwrap();
    assert!((p1 - 2.0 / 3.0).abs() < 1e-9, "P@1 = {}", p1);
    // Paris outranks every other token for Petrarch, leaving Arezzo sixth
    let mrr = run.summary.mrr.unwrap();
    assert!((mrr - (1.0 + 1.0 + 1.0 / 6.0) / 3.0).abs() < 1e-9, "MRR = {}", mrr);
    assert_eq!(run.summary.precision_at_10, Some(1.0));
    assert!(run.summary.macro_accuracy.is_none());
    assert!(run.summary.negation.is_none());
}

#[test]
fn all_kept_run_splits_into_full_batches() {
    let tmp = tempfile::tempdir().unwrap();
    let dataset = r#"{"sub_label": "Dante", "obj_label": "Florence", "masked_sentences": ["Dante was born in [MASK] ."]}
{"sub_label": "Caesar", "obj_label": "Rome", "masked_sentences": ["Caesar was born in [MASK] ."]}
{"sub_label": "Petrarch", "obj_label": "Arezzo", "masked_sentences": ["Petrarch was born in [MASK] ."]}
{"sub_label": "Voltaire", "obj_label": "Paris", "masked_sentences": ["Voltaire was born in [MASK] ."]}
"#;
    let config = ProbeConfig::new(write_dataset(tmp.path(), dataset))
        .with_max_sentence_length(10)
        .with_batch_size(2);

    let run = run_evaluation(&config, &model(), &LogProbRanker).unwrap();

    assert_eq!(run.filter.total, 4);
    assert_eq!(run.filter.kept, 4);
    assert_eq!(run.filter.excluded(), 0);
    assert_eq!(run.batches, 2);
    assert_eq!(run.summary.all_samples, 4);
    assert_eq!(run.summary.results, 4);
}

#[test]
fn unmasked_lines_are_excluded_not_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let dataset = r#"{"sub_label": "Dante", "obj_label": "Florence", "masked_sentences": ["Dante was born in [MASK] ."]}
{"sub_label": "Caesar", "obj_label": "Rome"}
{"sub_label": "Petrarch", "obj_label": "Arezzo", "masked_sentences": ["Petrarch was born in Arezzo ."]}
"#;
    let config = ProbeConfig::new(write_dataset(tmp.path(), dataset));

    let run = run_evaluation(&config, &model(), &LogProbRanker).unwrap();

    assert_eq!(run.filter.excluded(), 2);
    assert_eq!(run.summary.results, 1);
    assert_eq!(run.summary.precision_at_1, Some(1.0));
}

#[test]
fn template_run_rebuilds_sentences() {
    let tmp = tempfile::tempdir().unwrap();
    let config = ProbeConfig::new(write_dataset(tmp.path(), BORN_IN))
        .with_template("[X] was born in [Y] .");

    let run = run_evaluation(&config, &model(), &LogProbRanker).unwrap();

    let materialize = run.materialize.expect("template runs report facts");
    assert_eq!(materialize.total_probes, 3);
    assert_eq!(materialize.facts, 3);
    assert_eq!(run.summary.results, 3);
    assert!(run.summary.to_string().contains("global Precision at 1: 0.6667"));
}

#[test]
fn context_run_counts_facts_once() {
    let tmp = tempfile::tempdir().unwrap();
    let config = ProbeConfig::new(write_dataset(tmp.path(), BORN_IN))
        .with_template("[X] was born in [Y] .")
        .with_context(false);

    let run = run_evaluation(&config, &model(), &LogProbRanker).unwrap();

    // Dante contributes two evidence samples but one fact
    assert_eq!(run.summary.results, 4);
    let macro_accuracy = run.summary.macro_accuracy.unwrap();
    assert_eq!(macro_accuracy.facts, 3);
    assert_eq!(macro_accuracy.correct, 2);
    let (_, _, _, p1_re) = run.summary.headline();
    assert!((p1_re.unwrap() - 2.0 / 3.0).abs() < 1e-9);
}

#[test]
fn synthetic_negatives_swap_objects() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = ProbeConfig::new(write_dataset(tmp.path(), BORN_IN))
        .with_template("[X] was born in [Y] .")
        .with_context(true);
    config.seed = 7;

    let first = run_evaluation(&config, &model(), &LogProbRanker).unwrap();
    let second = run_evaluation(&config, &model(), &LogProbRanker).unwrap();

    assert!(first.materialize.as_ref().unwrap().synthetic);
    assert_eq!(first.summary.results, 4);
    assert_eq!(first.summary, second.summary, "seeded runs must agree");
}

// =============================================================================
// Negation
// =============================================================================

#[test]
fn negated_template_measures_overlap() {
    let tmp = tempfile::tempdir().unwrap();
    let config = ProbeConfig::new(write_dataset(tmp.path(), BORN_IN))
        .with_template("[X] was born in [Y] .")
        .with_negation(Some("[X] was not born in [Y] .".to_string()));
    let model = MockLanguageModel::new("mock", TOKENS)
        .predicting("not", "Paris")
        .predicting("Dante", "Florence")
        .predicting("Caesar", "Rome")
        .predicting("Petrarch", "Paris");

    let run = run_evaluation(&config, &model, &LogProbRanker).unwrap();

    let negation = run.summary.negation.unwrap();
    assert_eq!(negation.samples, 3);
    // Only Petrarch keeps Paris on top once negated
    let overlap = negation.overlap_at_1.unwrap();
    assert!((overlap - 1.0 / 3.0).abs() < 1e-9, "overlap = {}", overlap);
    let spearman = negation.spearman.unwrap();
    assert!((-1.0..=1.0).contains(&spearman));
    assert!(run.summary.to_string().contains("results negation:"));
}

#[test]
fn negation_without_negated_sentences_is_undefined() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = ProbeConfig::new(write_dataset(tmp.path(), BORN_IN));
    config.use_negated_probes = true;

    let run = run_evaluation(&config, &model(), &LogProbRanker).unwrap();

    let negation = run.summary.negation.unwrap();
    assert_eq!(negation.samples, 0);
    assert_eq!(negation.spearman, None);
    assert_eq!(negation.overlap_at_1, None);
    assert!(run.summary.to_string().contains("global spearman rank affirmative/negated: n/a"));
}

// =============================================================================
// Judgment strata
// =============================================================================

#[test]
fn judgment_strata_split_on_majority() {
    // The filter drops negatively judged probes, so build samples directly.
    let samples = vec![
        sample(0, "Dante", "Florence", &[true, true, false]),
        sample(1, "Caesar", "Rome", &[false, false, true]),
        sample(2, "Petrarch", "Arezzo", &[false, true, false]),
    ];
    let model = model();
    let engine = MetricsEngine::new(&model, &LogProbRanker, EngineOptions::default()).unwrap();
    let mut aggregator = Aggregator::new(false, false);
    for batch in batchify(&samples, 2).unwrap() {
        let outcomes = engine.score_batch(&batch, None).unwrap();
        for (s, outcome) in batch.samples.iter().zip(&outcomes) {
            aggregator.record(s, &outcome.ranking, None);
        }
    }
    engine.finish();
    let summary = aggregator.finalize(samples.len());

    let judgments = summary.judgments.unwrap();
    assert_eq!(judgments.positive.samples, 1);
    assert_eq!(judgments.negative.samples, 2);
    assert_eq!(judgments.positive.mrr, Some(1.0));
    let negative_mrr = judgments.negative.mrr.unwrap();
    assert!((negative_mrr - (1.0 + 1.0 / 6.0) / 2.0).abs() < 1e-9);
    let text = summary.to_string();
    assert!(text.contains("samples_with_negative_judgement: 2"));
    assert!(text.contains("MRR_positive: 1.0000"));
}

// =============================================================================
// Failure modes
// =============================================================================

#[test]
fn common_vocab_restricts_candidates() {
    let tmp = tempfile::tempdir().unwrap();
    let vocab_path = tmp.path().join("common_vocab.txt");
    std::fs::write(&vocab_path, "Rome\nFlorence\nArezzo\n").unwrap();
    let config = ProbeConfig::new(write_dataset(tmp.path(), BORN_IN)).with_common_vocab(&vocab_path);

    let run = run_evaluation(&config, &model(), &LogProbRanker).unwrap();

    // Only Rome and Florence outrank Arezzo once Paris is gone
    assert_eq!(run.summary.results, 3);
    let mrr = run.summary.mrr.unwrap();
    assert!((mrr - (1.0 + 1.0 + 1.0 / 3.0) / 3.0).abs() < 1e-9, "MRR = {}", mrr);
}

#[test]
fn scripted_model_failure_aborts_run() {
    let tmp = tempfile::tempdir().unwrap();
    let config = ProbeConfig::new(write_dataset(tmp.path(), BORN_IN));
    let model = MockLanguageModel::new("mock", TOKENS).with_row("Caesar", vec![0.0; 2]);

    let err = run_evaluation(&config, &model, &LogProbRanker).unwrap_err();
    assert!(matches!(err, factprobe::Error::Inference(_)), "{:?}", err);
}
