//! Benchmarks for ranking on worker pools of different sizes.
//!
//! Uses a large frequency-prior vocabulary so the per-sample sort dominates.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use factprobe::backends::UnigramModel;
use factprobe::eval::{batchify, EngineOptions, LogProbRanker, MetricsEngine, RankQuery, Ranker};
use factprobe::{ProbeId, Sample, Vocabulary};

const VOCAB_SIZE: usize = 20_000;

fn create_model() -> UnigramModel {
    let counts = (0..VOCAB_SIZE).map(|i| (format!("tok{}", i), (i % 997) as u64 + 1));
    UnigramModel::from_counts(counts).expect("non-empty counts")
}

fn create_samples(count: usize) -> Vec<Sample> {
    (0..count)
        .map(|i| Sample {
            uuid: ProbeId::Index(i as u64),
            subject_label: format!("subject{}", i),
            object_label: format!("tok{}", (i * 31) % VOCAB_SIZE),
            object_surface: None,
            context: None,
            masked_sentences: vec![format!("subject{} was born in [MASK] .", i)],
            negated: None,
            judgments: None,
        })
        .collect()
}

fn bench_single_ranking(c: &mut Criterion) {
    let vocab = Vocabulary::new((0..VOCAB_SIZE).map(|i| format!("tok{}", i)));
    let rows = vec![(0..VOCAB_SIZE)
        .map(|i| -((i * 7919 % VOCAB_SIZE) as f32))
        .collect::<Vec<f32>>()];

    c.bench_function("rank_one_row", |b| {
        b.iter(|| {
            let result = LogProbRanker.rank(&RankQuery {
                log_probs: black_box(&rows),
                masked_positions: &[0],
                vocab: &vocab,
                label_index: 42,
                index_list: None,
                top_k: 10_000,
            });
            black_box(result)
        })
    });
}

fn bench_engine_threads(c: &mut Criterion) {
    let model = create_model();
    let samples = create_samples(256);
    let batches = batchify(&samples, 32).expect("positive batch size");

    let mut group = c.benchmark_group("engine_threads");
    group.sample_size(10);

    for &threads in &[1usize, 2, 4, 8] {
        let engine = MetricsEngine::new(
            &model,
            &LogProbRanker,
            EngineOptions {
                threads,
                ..EngineOptions::default()
            },
        )
        .expect("worker pool");

        group.bench_with_input(
            BenchmarkId::new("score_batches", threads),
            &batches,
            |b, batches| {
                b.iter(|| {
                    let mut hits = 0.0;
                    for batch in batches {
                        for outcome in engine.score_batch(batch, None).expect("scored") {
                            hits += outcome.ranking.precision_at_1;
                        }
                    }
                    black_box(hits)
                })
            },
        );
        engine.finish();
    }

    group.finish();
}

criterion_group!(benches, bench_single_ranking, bench_engine_threads);
criterion_main!(benches);
