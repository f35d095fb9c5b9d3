//! Workflow engine benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use placenet_core::{
    places, BoxError, CallContext, Definition, Event, EventKind, GuardEvent, Registry, Transition,
    Workflow,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// Global counter to keep workflow names unique across iterations
static WORKFLOW_COUNTER: AtomicU64 = AtomicU64::new(0);

fn linear_definition(len: usize) -> Arc<Definition> {
    let names: Vec<String> = (0..len).map(|i| format!("place_{}", i)).collect();
    let transitions = (0..len - 1)
        .map(|i| {
            Transition::must(
                format!("next_{}", i),
                places([names[i].as_str()]),
                places([names[i + 1].as_str()]),
            )
        })
        .collect();
    Arc::new(Definition::must(places(names.iter().map(String::as_str)), transitions))
}

fn fork_definition() -> Arc<Definition> {
    Arc::new(Definition::must(
        places(["start", "legal", "tech", "done"]),
        vec![
            Transition::must("submit", places(["start"]), places(["legal", "tech"])),
            Transition::must("approve", places(["legal", "tech"]), places(["done"])),
            Transition::must("reset", places(["done"]), places(["start"])),
        ],
    ))
}

fn bench_definition(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_definition");

    for size in [2, 20, 200] {
        let doc = linear_definition(size).to_document();
        group.bench_with_input(BenchmarkId::new("from_document", size), &doc, |b, doc| {
            b.iter(|| black_box(Definition::from_document(doc.clone()).unwrap()))
        });
    }

    group.finish();
}

fn bench_can(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_can");
    group.throughput(Throughput::Elements(1));

    let wf = Workflow::new("wf", fork_definition(), "start").unwrap();
    let to = places(["legal", "tech"]);
    group.bench_function("allowed", |b| b.iter(|| black_box(wf.can(&to).is_ok())));

    let wrong = places(["done"]);
    group.bench_function("not_allowed", |b| b.iter(|| black_box(wf.can(&wrong).is_err())));

    let mut guarded = Workflow::new("guarded", fork_definition(), "start").unwrap();
    for _ in 0..10 {
        guarded.add_guard_listener(|event: &mut GuardEvent<'_>| {
            if event.context("blocked").is_some() {
                event.block();
            }
            Ok(())
        });
    }
    let ctx = CallContext::new().with_value("actor", "bench");
    group.bench_function("ten_guards", |b| {
        b.iter(|| black_box(guarded.can_with_context(&ctx, &to).is_ok()))
    });

    group.finish();
}

fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_apply");
    group.throughput(Throughput::Elements(3));

    let mut wf = Workflow::new("cycle", fork_definition(), "start").unwrap();
    let steps = [
        places(["legal", "tech"]),
        places(["done"]),
        places(["start"]),
    ];
    group.bench_function("fork_join_cycle", |b| {
        b.iter(|| {
            for to in &steps {
                wf.apply(to).unwrap();
            }
        })
    });

    let mut observed = Workflow::new("observed", fork_definition(), "start").unwrap();
    observed.add_event_listener(EventKind::BeforeTransition, |_: &Event<'_>| -> Result<(), BoxError> {
        Ok(())
    });
    observed.add_event_listener(EventKind::AfterTransition, |event: &Event<'_>| -> Result<(), BoxError> {
        black_box(event.to().len());
        Ok(())
    });
    group.bench_function("with_listeners", |b| {
        b.iter(|| {
            for to in &steps {
                observed.apply(to).unwrap();
            }
        })
    });

    group.finish();
}

fn bench_diagram(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_diagram");

    for size in [4, 40, 400] {
        let wf = Workflow::new("diagram", linear_definition(size), "place_0").unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &wf, |b, wf| {
            b.iter(|| black_box(wf.diagram()))
        });
    }

    group.finish();
}

fn bench_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_registry");
    group.throughput(Throughput::Elements(1));

    let definition = fork_definition();
    let registry = Registry::new();
    for i in 0..1000 {
        let wf = Workflow::new(format!("wf-{}", i), definition.clone(), "start").unwrap();
        registry.add_workflow(wf.into_shared()).unwrap();
    }

    group.bench_function("lookup", |b| {
        let mut i = 0u64;
        b.iter(|| {
            i = (i + 1) % 1000;
            black_box(registry.workflow(&format!("wf-{}", i)).unwrap())
        })
    });

    group.bench_function("add_remove", |b| {
        b.iter(|| {
            let id = WORKFLOW_COUNTER.fetch_add(1, Ordering::Relaxed);
            let name = format!("tmp-{}", id);
            let wf = Workflow::new(name.as_str(), definition.clone(), "start").unwrap();
            registry.add_workflow(wf.into_shared()).unwrap();
            black_box(registry.remove_workflow(&name).unwrap())
        })
    });

    group.bench_function("list", |b| b.iter(|| black_box(registry.list_workflows())));

    group.finish();
}

criterion_group!(
    benches,
    bench_definition,
    bench_can,
    bench_apply,
    bench_diagram,
    bench_registry
);
criterion_main!(benches);
