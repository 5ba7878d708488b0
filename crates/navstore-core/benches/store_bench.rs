//! # Store Benchmarks
//!
//! Performance benchmarks for navstore-core store operations.
//!
//! Run with: `cargo bench -p navstore-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use navstore_core::{
    EntitySet, EntityType, KeyPredicate, MergeEngine, NavigationDef, PrimitiveKind, PropertyDef,
    Schema, Store,
};
use std::hint::black_box;

fn schema() -> Schema {
    Schema::new()
        .with_entity_type(
            EntityType::new("ETItem")
                .with_key(PropertyDef::primitive("Id", PrimitiveKind::Int32))
                .with_property(PropertyDef::primitive("Name", PrimitiveKind::String))
                .with_navigation(NavigationDef::one("Owner", "ETOwner").with_partner("Items")),
        )
        .with_entity_type(
            EntityType::new("ETOwner")
                .with_key(PropertyDef::primitive("Id", PrimitiveKind::Int32))
                .with_navigation(NavigationDef::many("Items", "ETItem").with_partner("Owner")),
        )
        .with_entity_set(EntitySet::new("Items", "ETItem").with_binding("Owner", "Owners"))
        .with_entity_set(EntitySet::new("Owners", "ETOwner").with_binding("Items", "Items"))
}

/// A store with `size` items, all linked to one owner.
fn populated(size: usize) -> Store {
    let mut store = Store::new(schema()).expect("schema");
    let owner = store.create("Owners").expect("owner").id;
    for _ in 0..size {
        let item = store.create("Items").expect("item").id;
        MergeEngine::create_link(&mut store, item, "Owner", owner).expect("link");
    }
    store
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_create(c: &mut Criterion) {
    let mut group = c.benchmark_group("create");

    for size in [100, 500, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut store = Store::new(schema()).expect("schema");
                for _ in 0..size {
                    let _ = store.create("Items");
                }
                black_box(store)
            });
        });
    }

    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_by_key");

    for size in [100, 1000, 5000].iter() {
        let store = populated(*size);
        let key = [KeyPredicate::new("Id", (*size / 2) as i64)];

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(store.read("Items", &key)));
        });
    }

    group.finish();
}

fn bench_delete_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("delete_sweep");

    for size in [100, 500, 1000].iter() {
        let store = populated(*size);
        let victim = store
            .read_all("Items")
            .and_then(|c| c.ids().first().copied())
            .expect("item");

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut store = store.clone();
                black_box(store.delete("Items", victim))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_create, bench_read, bench_delete_sweep);
criterion_main!(benches);
