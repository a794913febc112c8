//! Performance Benchmarks for the Similarity Metrics
//!
//! - BLEU over growing snippets
//! - Structural analysis and tree edit distance
//! - Full pairwise comparison with and without memoized analyses

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use codesim_rs::core::similarity::SimilarityCalculator;
use codesim_rs::detectors::lexical::bleu;
use codesim_rs::detectors::structure::{analyze, compare_structures, StructureProfile, StructureTree};
use codesim_rs::lang::python::PythonAdapter;

/// Generate a Python module with `functions` similar functions
fn generate_module(functions: usize, seed: usize) -> String {
    let mut source = String::new();
    for i in 0..functions {
        source.push_str(&format!(
            r#"
def function_{i}(values):
    total = {seed}
    for value in values:
        if value % 2 == 0:
            total += value * {i}
        else:
            total -= value
    return total
"#
        ));
    }
    source
}

fn structure_profile(source: &str) -> StructureProfile {
    let mut adapter = PythonAdapter::new().unwrap();
    let tree = adapter.parse(source).unwrap();
    let structure = StructureTree::from_tree(&tree, source);
    StructureProfile::from_structure(&structure, 1500)
}

fn bench_bleu(c: &mut Criterion) {
    let mut group = c.benchmark_group("bleu");
    group.measurement_time(Duration::from_secs(5));

    for size in [1, 10, 50] {
        let reference = generate_module(size, 1);
        let candidate = generate_module(size, 2);
        group.throughput(Throughput::Bytes(reference.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| bleu(black_box(&reference), black_box(&candidate)))
        });
    }
    group.finish();
}

fn bench_structure(c: &mut Criterion) {
    let mut group = c.benchmark_group("structure");

    for size in [1, 10, 30] {
        let reference = generate_module(size, 1);
        let candidate = generate_module(size, 2);

        group.bench_with_input(BenchmarkId::new("analyze", size), &size, |b, _| {
            b.iter(|| analyze(black_box(&reference)))
        });

        let a = structure_profile(&reference);
        let b_profile = structure_profile(&candidate);
        group.bench_with_input(BenchmarkId::new("compare", size), &size, |b, _| {
            b.iter(|| compare_structures(black_box(&a), black_box(&b_profile)))
        });
    }
    group.finish();
}

fn bench_pairwise(c: &mut Criterion) {
    let mut group = c.benchmark_group("pairwise");
    let reference = generate_module(10, 1);
    let candidate = generate_module(10, 2);

    group.bench_function("cold", |b| {
        b.iter(|| {
            let calc = SimilarityCalculator::with_defaults();
            calc.compare_sources(black_box(&reference), black_box(&candidate))
        })
    });

    let warm = SimilarityCalculator::with_defaults();
    group.bench_function("memoized", |b| {
        b.iter(|| warm.compare_sources(black_box(&reference), black_box(&candidate)))
    });
    group.finish();
}

criterion_group!(benches, bench_bleu, bench_structure, bench_pairwise);
criterion_main!(benches);
