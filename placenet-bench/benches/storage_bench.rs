//! State storage and history benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use placenet_core::{places, ContextMap, Place};
use placenet_storage::{
    FileHistory, FileStorage, HistoryStore, MemoryHistory, MemoryStorage, QueryOptions, Storage,
    TransitionRecord,
};
use std::collections::BTreeMap;
use tempfile::TempDir;

fn sample_context() -> ContextMap {
    let mut ctx = ContextMap::new();
    ctx.insert("owner".to_string(), serde_json::json!("u-123"));
    ctx.insert("amount".to_string(), serde_json::json!(100));
    ctx
}

fn record(i: usize) -> TransitionRecord {
    TransitionRecord {
        workflow_id: "bench".to_string(),
        from: places(["legal", "tech"]),
        to: places(["done"]),
        transition: format!("step_{}", i % 4),
        notes: String::new(),
        actor: if i % 2 == 0 { "alice" } else { "bob" }.to_string(),
        created_at: Default::default(),
        custom_fields: BTreeMap::new(),
    }
}

fn bench_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("storage_state");
    group.throughput(Throughput::Elements(1));

    let marking: Vec<Place> = places(["legal", "tech"]);
    let ctx = sample_context();

    let memory = MemoryStorage::new();
    group.bench_function("memory_save_load", |b| {
        b.iter(|| {
            memory.save_state("wf", &marking, &ctx).unwrap();
            black_box(memory.load_state("wf").unwrap())
        })
    });

    let dir = TempDir::new().unwrap();
    let file = FileStorage::open(dir.path()).unwrap();
    group.bench_function("file_save", |b| {
        b.iter(|| file.save_state("wf", &marking, &ctx).unwrap())
    });
    group.bench_function("file_load", |b| b.iter(|| black_box(file.load_state("wf").unwrap())));

    group.finish();
}

fn bench_history(c: &mut Criterion) {
    let mut group = c.benchmark_group("storage_history");

    let memory = MemoryHistory::new();
    let dir = TempDir::new().unwrap();
    let file = FileHistory::open(dir.path()).unwrap();
    for i in 0..1000 {
        memory.save_transition(&record(i)).unwrap();
        file.save_transition(&record(i)).unwrap();
    }

    let opts = QueryOptions::default().with_actor("alice").with_limit(20);
    group.bench_function("memory_query", |b| {
        b.iter(|| black_box(memory.list_history("bench", &opts).unwrap()))
    });
    group.bench_function("file_query", |b| {
        b.iter(|| black_box(file.list_history("bench", &opts).unwrap()))
    });

    group.finish();
}

criterion_group!(benches, bench_state, bench_history);
criterion_main!(benches);
