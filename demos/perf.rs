//! Quick-and-dirty throughput check: run with
//! `cargo run --release --example perf`.

use shortkv::config::ExpiringConfigBuilder;
use shortkv::{ExpiringStore, ValueKind};
use std::time::Instant;

const NUM_PUTS: usize = 20_000;

fn main() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = ExpiringConfigBuilder::new(dir.path())
        .with_generate_strings_up_to(5)
        .build()
        .expect("valid config");
    let store = ExpiringStore::open(config);

    let start = Instant::now();
    let mut ids = Vec::with_capacity(NUM_PUTS);
    for i in 0..NUM_PUTS {
        let url = format!("https://example.com/{i}");
        let id = store.put(url, ValueKind::Url, 6, 3600).expect("put should succeed");
        ids.push(id);
    }
    let put_elapsed = start.elapsed();

    let start = Instant::now();
    for id in &ids {
        store.get(id).expect("get should succeed for a just-put id");
    }
    let get_elapsed = start.elapsed();

    println!("{NUM_PUTS} puts in {put_elapsed:?} ({:.0} puts/sec)", NUM_PUTS as f64 / put_elapsed.as_secs_f64());
    println!("{NUM_PUTS} gets in {get_elapsed:?} ({:.0} gets/sec)", NUM_PUTS as f64 / get_elapsed.as_secs_f64());
}
