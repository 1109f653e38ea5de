//! Changeset apply benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use rusqlite::Connection;
use sqlpatch_bench::insert_changeset;
use sqlpatch_core::{apply_changeset, apply_changeset_with, ApplyConfig};
use sqlpatch_testkit::scenarios;

/// Benchmark applying batches of inserts to a fresh store.
fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_insert");

    for rows in [10, 100, 1000] {
        let data = insert_changeset(2, rows, 32);
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &data, |b, data| {
            b.iter_batched(
                scenarios::fruit_store,
                |mut store| {
                    let stats = apply_changeset(&mut store.conn, black_box(data)).unwrap();
                    black_box(stats)
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

/// Benchmark dry runs, which apply and roll back against the same store.
fn bench_dry_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_dry_run");
    let config = ApplyConfig::new().dry_run(true);

    for rows in [100, 1000] {
        let data = insert_changeset(2, rows, 32);
        let mut store = scenarios::fruit_store();
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &data, |b, data| {
            b.iter(|| apply_changeset_with(&mut store.conn, black_box(data), &config).unwrap());
        });
    }
    group.finish();
}

/// Benchmark updates that match rows by primary key and old value.
fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_update");

    for rows in [100, 1000] {
        let data = scenarios::recolour_changeset(rows);
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &data, |b, data| {
            b.iter_batched(
                || scenarios::populated_fruit_store(rows),
                |mut store| apply_changeset(&mut store.conn, black_box(data)).unwrap(),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

/// Benchmark applying to an on-disk database.
fn bench_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_file");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bench.db");
    let mut conn = Connection::open(&path).unwrap();
    conn.execute_batch("CREATE TABLE Entries (ID INTEGER PRIMARY KEY, Name TEXT, Farbe BLOB)")
        .unwrap();

    let rows = 1000;
    let data = insert_changeset(0, rows, 32);
    let config = ApplyConfig::new().dry_run(true);
    group.throughput(Throughput::Elements(rows as u64));
    group.bench_function("dry_run_1000", |b| {
        b.iter(|| apply_changeset_with(&mut conn, black_box(&data), &config).unwrap());
    });
    group.finish();
}

criterion_group!(benches, bench_insert, bench_dry_run, bench_update, bench_file);
criterion_main!(benches);
