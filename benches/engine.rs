use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use shortkv::config::ExpiringConfigBuilder;
use shortkv::{ExpiringStore, ValueKind};

fn bench_put(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let config = ExpiringConfigBuilder::new(dir.path()).with_generate_strings_up_to(6).build().unwrap();
    let store = ExpiringStore::open(config);

    let mut counter = 0u64;
    c.bench_function("put_url", |b| {
        b.iter(|| {
            counter += 1;
            store.put(format!("https://example.com/{counter}"), ValueKind::Url, 7, 3600).unwrap();
        });
    });
}

fn bench_get(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let config = ExpiringConfigBuilder::new(dir.path()).with_generate_strings_up_to(6).build().unwrap();
    let store = ExpiringStore::open(config);
    let id = store.put("https://example.com/hot".into(), ValueKind::Url, 7, 3600).unwrap();

    c.bench_function("get_url", |b| {
        b.iter(|| store.get(&id).unwrap());
    });
}

fn bench_put_varying_length(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let config = ExpiringConfigBuilder::new(dir.path()).with_generate_strings_up_to(6).build().unwrap();
    let store = ExpiringStore::open(config);

    let mut group = c.benchmark_group("put_by_length");
    let mut counter = 0u64;
    for length in [6usize, 8, 10] {
        group.bench_with_input(BenchmarkId::from_parameter(length), &length, |b, &length| {
            b.iter(|| {
                counter += 1;
                store.put(format!("https://example.com/{counter}"), ValueKind::Url, length, 3600).unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_put, bench_get, bench_put_varying_length);
criterion_main!(benches);
