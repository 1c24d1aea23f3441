//! Criterion benchmarks for canopy-rf: forest training and prediction.

use criterion::{Criterion, criterion_group, criterion_main};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use canopy_io::{
    ColumnData, ColumnSpec, ColumnStats, DataSpec, Dataset, Dictionary, NumericalStats,
};
use canopy_rf::{Task, TrainingConfig};

/// Numerical features plus a categorical label in the last column.
///
/// Features 0-2 are informative (class * 3.0 + noise in [0, 0.5]); the rest
/// are pure noise.
fn make_classification(n_samples: usize, n_features: usize, n_classes: usize, seed: u64) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut columns = vec![Vec::with_capacity(n_samples); n_features];
    let mut labels = Vec::with_capacity(n_samples);
    for i in 0..n_samples {
        let class = i % n_classes;
        labels.push(class as u32 + 1);
        for (f, column) in columns.iter_mut().enumerate() {
            let base = if f < 3 { class as f64 * 3.0 } else { 0.0 };
            column.push(base + rng.r#gen::<f64>() * 0.5);
        }
    }

    let stats = NumericalStats {
        mean: 0.0,
        stddev: 0.0,
        min: 0.0,
        max: 0.0,
    };
    let mut specs: Vec<ColumnSpec> = (0..n_features)
        .map(|f| ColumnSpec::new(format!("f{f}"), ColumnStats::Numerical(stats), 0))
        .collect();
    let classes = Dictionary::from_values((0..n_classes).map(|c| format!("c{c}")));
    specs.push(ColumnSpec::new("label", ColumnStats::Categorical(classes), 0));

    let mut data: Vec<ColumnData> = columns.into_iter().map(ColumnData::Numerical).collect();
    data.push(ColumnData::Categorical(labels));
    Dataset::new(DataSpec::new(specs, n_samples as u64), data).unwrap()
}

fn config(num_trees: usize, n_features: usize) -> TrainingConfig {
    TrainingConfig::new(Task::Classification)
        .with_num_trees(num_trees)
        .with_label_column(n_features)
        .with_seed(42)
}

fn bench_rf_train(c: &mut Criterion) {
    let dataset = make_classification(500, 20, 5, 42);
    let cfg = config(50, 20);

    c.bench_function("rf_train_500x20_5class_50trees", |b| {
        b.iter(|| cfg.fit(&dataset).unwrap());
    });
}

fn bench_rf_predict_dataset(c: &mut Criterion) {
    let dataset = make_classification(500, 20, 5, 42);
    let model = config(50, 20).fit(&dataset).unwrap().into_model();

    c.bench_function("rf_predict_dataset_500x20_50trees", |b| {
        b.iter(|| model.predict_dataset(&dataset).unwrap());
    });
}

fn bench_single_tree(c: &mut Criterion) {
    // Proxy for split search: one tree over 500 rows.
    let dataset = make_classification(500, 20, 5, 42);
    let cfg = config(1, 20).with_num_threads(1);

    c.bench_function("rf_single_tree_500x20_5class", |b| {
        b.iter(|| cfg.fit(&dataset).unwrap());
    });
}

criterion_group!(benches, bench_rf_train, bench_rf_predict_dataset, bench_single_tree);
criterion_main!(benches);
