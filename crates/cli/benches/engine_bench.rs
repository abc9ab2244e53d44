use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use engine::KvStore;
use memtable::Memtable;
use sstable::{write_from_memtable, SsTable};
use tempfile::tempdir;

const N_KEYS: u64 = 10_000;
const VALUE_SIZE: usize = 100;

fn build_memtable() -> Memtable {
    let mut mem = Memtable::new();
    for i in 0..N_KEYS {
        mem.put(i, vec![b'x'; VALUE_SIZE]);
    }
    mem
}

fn table_write_benchmark(c: &mut Criterion) {
    c.bench_function("table_write_from_memtable_10k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let path = dir.path().join("1.sst");
                let mem = build_memtable();
                (dir, path, mem)
            },
            |(_dir, path, mem)| {
                write_from_memtable(&mem, 1, 1, &path).unwrap();
            },
            BatchSize::SmallInput,
        );
    });
}

fn table_get_hit_benchmark(c: &mut Criterion) {
    c.bench_function("table_get_hit_10k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let path = dir.path().join("1.sst");
                write_from_memtable(&build_memtable(), 1, 1, &path).unwrap();
                (dir, SsTable::open(&path).unwrap())
            },
            |(_dir, table)| {
                for i in 0..N_KEYS {
                    assert!(table.get(i).unwrap().is_some());
                }
            },
            BatchSize::LargeInput,
        );
    });
}

fn table_get_miss_benchmark(c: &mut Criterion) {
    c.bench_function("table_get_miss_10k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let path = dir.path().join("1.sst");
                write_from_memtable(&build_memtable(), 1, 1, &path).unwrap();
                (dir, SsTable::open(&path).unwrap())
            },
            |(_dir, table)| {
                for i in N_KEYS..2 * N_KEYS {
                    assert!(table.get(i).unwrap().is_none());
                }
            },
            BatchSize::LargeInput,
        );
    });
}

fn store_fill_benchmark(c: &mut Criterion) {
    c.bench_function("store_put_10k_with_flushes", |b| {
        b.iter_batched(
            || tempdir().unwrap(),
            |dir| {
                let mut store = KvStore::open(dir.path()).unwrap();
                for i in 0..N_KEYS {
                    store.put(i, vec![b'x'; VALUE_SIZE]).unwrap();
                }
            },
            BatchSize::PerIteration,
        );
    });
}

criterion_group!(
    benches,
    table_write_benchmark,
    table_get_hit_benchmark,
    table_get_miss_benchmark,
    store_fill_benchmark
);
criterion_main!(benches);
