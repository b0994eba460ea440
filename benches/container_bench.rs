//! Benchmarks for the service container

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use serde_json::json;
use service_locator::{
    AbstractFactoryRef, AliasGraph, Callback, Container, DelegatorRef, FactoryRef,
    FnAbstractFactory, Options, ServiceConfig, instance,
};
use std::hint::black_box;
use std::thread;

#[allow(dead_code)]
struct SmallService {
    value: i32,
}

#[allow(dead_code)]
struct MediumService {
    name: String,
    values: Vec<i32>,
}

fn small_factory(_: &Container, _: &str, _: Option<&Options>) -> service_locator::Result<service_locator::Instance> {
    Ok(instance(SmallService { value: 42 }))
}

fn passthrough(
    _: &Container,
    _: &str,
    next: Callback,
    _: Option<&Options>,
) -> service_locator::Result<service_locator::Instance> {
    next()
}

fn bench_registration(c: &mut Criterion) {
    let mut group = c.benchmark_group("registration");

    group.bench_function("set_service", |b| {
        b.iter(|| {
            let container = Container::new();
            container
                .set_service("small", SmallService { value: 42 })
                .unwrap();
            black_box(container)
        })
    });

    group.bench_function("set_factory", |b| {
        b.iter(|| {
            let container = Container::new();
            container
                .set_factory("small", FactoryRef::from_fn(small_factory))
                .unwrap();
            black_box(container)
        })
    });

    group.bench_function("configure_json", |b| {
        let raw = json!({
            "factories": { "A": "InvokableFactory", "B": "InvokableFactory" },
            "aliases": { "a": "A", "b": "B", "first": "a" },
            "shared": { "B": false }
        });

        b.iter(|| {
            let container = Container::new();
            container.configure_json(&raw).unwrap();
            black_box(container)
        })
    });

    group.finish();
}

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");
    group.throughput(Throughput::Elements(1));

    let container = Container::new();
    container
        .set_service(
            "medium",
            MediumService {
                name: "test".to_string(),
                values: vec![1, 2, 3, 4, 5],
            },
        )
        .unwrap();
    container
        .set_factory("small", FactoryRef::from_fn(small_factory))
        .unwrap();
    container
        .configure(ServiceConfig::new().alias("s", "small").alias("s2", "s"))
        .unwrap();

    group.bench_function("get_cached", |b| {
        b.iter(|| {
            let service = container.get::<MediumService>("medium").unwrap();
            black_box(service)
        })
    });

    group.bench_function("get_through_alias", |b| {
        b.iter(|| {
            let service = container.get::<SmallService>("s2").unwrap();
            black_box(service)
        })
    });

    group.bench_function("has_check", |b| {
        b.iter(|| {
            let exists = container.has("small");
            black_box(exists)
        })
    });

    group.bench_function("try_get_not_found", |b| {
        b.iter(|| {
            let service = container.try_get::<SmallService>("missing");
            black_box(service)
        })
    });

    group.finish();
}

fn bench_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("creation");
    group.throughput(Throughput::Elements(1));

    let container = Container::new();
    container
        .set_factory("small", FactoryRef::from_fn(small_factory))
        .unwrap();
    container
        .set_factory("decorated", FactoryRef::from_fn(small_factory))
        .unwrap();
    for _ in 0..3 {
        container
            .add_delegator("decorated", DelegatorRef::from_fn(passthrough))
            .unwrap();
    }
    container
        .add_abstract_factory(AbstractFactoryRef::instance(FnAbstractFactory::new(
            |_: &Container, name: &str| name.starts_with("dyn."),
            small_factory,
        )))
        .unwrap();

    group.bench_function("build_factory", |b| {
        b.iter(|| {
            let service = container.build_any("small", None).unwrap();
            black_box(service)
        })
    });

    group.bench_function("build_three_delegators", |b| {
        b.iter(|| {
            let service = container.build_any("decorated", None).unwrap();
            black_box(service)
        })
    });

    group.bench_function("build_abstract_factory", |b| {
        b.iter(|| {
            let service = container.build_any("dyn.small", None).unwrap();
            black_box(service)
        })
    });

    group.finish();
}

fn bench_aliases(c: &mut Criterion) {
    let mut group = c.benchmark_group("aliases");

    let chain: Vec<(String, String)> = (0..1_000)
        .map(|i| (format!("n{i}"), format!("n{}", i + 1)))
        .collect();

    group.throughput(Throughput::Elements(chain.len() as u64));
    group.bench_function("bulk_resolve_chain_1000", |b| {
        b.iter(|| {
            let mut graph = AliasGraph::new();
            graph.extend(chain.iter().cloned()).unwrap();
            black_box(graph)
        })
    });

    group.finish();
}

fn bench_concurrent(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent");

    group.bench_function("concurrent_reads_4", |b| {
        let container = Container::new();
        container
            .set_factory("small", FactoryRef::from_fn(small_factory))
            .unwrap();
        container.set_alias("s", "small").unwrap();

        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let c = container.clone();
                    thread::spawn(move || {
                        for _ in 0..100 {
                            let _ = c.get::<SmallService>("s").unwrap();
                        }
                    })
                })
                .collect();

            for h in handles {
                h.join().unwrap();
            }
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_registration,
    bench_resolution,
    bench_creation,
    bench_aliases,
    bench_concurrent,
);

criterion_main!(benches);
