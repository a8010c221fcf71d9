use chargeflow_analytics::clustering::{ClusteringEngine, Observation};
use chargeflow_analytics::config::ClusteringConfig;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn create_observations(count: usize) -> Vec<Observation> {
    (0..count)
        .map(|i| {
            let blob = (i % 4) as f64;
            let offset = (i / 4) as f64 * 0.3;
            Observation {
                feature1_name: "energy_consumed_kwh".to_string(),
                feature2_name: "charging_rate_kw".to_string(),
                feature1_value: Some(60.0 * blob + offset),
                feature2_value: Some(35.0 * blob - offset),
            }
        })
        .collect()
}

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    let engine = ClusteringEngine::new(ClusteringConfig::default());

    // Cost scales with the candidate search, so batch size dominates
    for size in [10, 50, 200].iter() {
        let observations = create_observations(*size);

        group.bench_with_input(
            BenchmarkId::new("observations", size),
            &observations,
            |b, obs| b.iter(|| engine.classify(black_box(obs)).unwrap()),
        );
    }
    group.finish();
}

fn bench_fixed_cluster_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("fixed_k");
    let engine = ClusteringEngine::new(ClusteringConfig::default());

    // Two points short-circuit to a single cluster, no candidate search
    let observations = create_observations(2);
    group.bench_function("two_observations", |b| {
        b.iter(|| engine.classify(black_box(&observations)).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_classify, bench_fixed_cluster_count);
criterion_main!(benches);
