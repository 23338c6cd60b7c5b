//! # Reflection Benchmarks
//!
//! Run with: `cargo bench -p loom-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use loom_core::graph::{Graph, GraphStore};
use loom_core::{ApiSpec, FieldSpec, Ingestor, ModuleSpec, ParameterSpec, Reflector, TypeSpec};
use std::hint::black_box;

/// A module with `types` types of eight fields each and one API per type.
fn wide_spec(types: usize) -> ModuleSpec {
    ModuleSpec {
        id: "bench".to_string(),
        name: "Bench".to_string(),
        version: "1.0.0".to_string(),
        types: (0..types)
            .map(|t| TypeSpec {
                name: format!("Type{t}"),
                description: None,
                fields: (0..8)
                    .map(|f| FieldSpec::new(format!("field{f}"), "string", f % 2 == 0))
                    .collect(),
            })
            .collect(),
        apis: (0..types)
            .map(|t| ApiSpec {
                name: format!("get{t}"),
                verb: "GET".to_string(),
                route: format!("/type{t}/{{id}}"),
                description: None,
                parameters: vec![ParameterSpec::new("id", "string", true)],
            })
            .collect(),
        ..ModuleSpec::default()
    }
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_reflect(c: &mut Criterion) {
    let mut group = c.benchmark_group("reflect");

    for size in [10, 100, 500].iter() {
        let spec = wide_spec(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(Reflector::reflect_spec(&spec, "bench-spec")));
        });
    }

    group.finish();
}

fn bench_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest");

    for size in [10, 100, 500].iter() {
        let nodes = Reflector::reflect_spec(&wide_spec(*size), "bench-spec").expect("reflect");
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(Ingestor::ingest(&nodes)));
        });
    }

    group.finish();
}

fn bench_store_reflected(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_reflected");

    for size in [10, 100].iter() {
        let nodes = Reflector::reflect_spec(&wide_spec(*size), "bench-spec").expect("reflect");
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut graph = Graph::new();
                graph.upsert_many(nodes.clone()).expect("upsert");
                black_box(graph)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_reflect, bench_ingest, bench_store_reflected);

criterion_main!(benches);
