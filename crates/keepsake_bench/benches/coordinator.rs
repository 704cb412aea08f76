//! End-to-end coordinator benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use keepsake_codec::{SerializationResolver, SerializerConfig};
use keepsake_core::{CoordinatorConfig, FileCoordinator};
use keepsake_storage::{FileStorage, MemoryStorage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::runtime::Runtime;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Settings {
    language: String,
    volume: f32,
    bindings: Vec<(String, String)>,
}

fn settings() -> Settings {
    Settings {
        language: "en".into(),
        volume: 0.8,
        bindings: (0..64)
            .map(|i| (format!("action_{i}"), format!("key_{}", i % 26)))
            .collect(),
    }
}

fn encrypted() -> SerializationResolver {
    SerializationResolver::new(SerializerConfig::encrypted(
        "bench-password",
        b"bench-salt".to_vec(),
        1000,
    ))
    .unwrap()
}

/// Benchmark cached loads against uncached ones.
fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("coordinator_load");

    for cache_enabled in [true, false] {
        let storage = Arc::new(MemoryStorage::new());
        let files = FileCoordinator::new(storage, encrypted())
            .with_config(CoordinatorConfig::new().cache_enabled(cache_enabled));
        files.save("settings", &settings()).unwrap();

        let name = if cache_enabled { "cached" } else { "uncached" };
        group.bench_function(name, |b| {
            b.iter(|| black_box(files.load::<Settings>(black_box("settings"))));
        });
    }

    group.finish();
}

/// Benchmark saves, with and without redundant-write suppression.
fn bench_save(c: &mut Criterion) {
    let mut group = c.benchmark_group("coordinator_save");
    group.sample_size(50);

    for dedup in [true, false] {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(FileStorage::new(temp_dir.path()));
        let files = FileCoordinator::new(storage, encrypted())
            .with_config(CoordinatorConfig::new().dedup_writes(dedup));
        let value = settings();

        let name = if dedup { "unchanged_dedup" } else { "unchanged_write" };
        group.bench_function(name, |b| {
            b.iter(|| black_box(files.save("settings.sav", black_box(&value)).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark queued asynchronous saves.
fn bench_save_async(c: &mut Criterion) {
    let mut group = c.benchmark_group("coordinator_save_async");
    group.sample_size(20);
    let runtime = Runtime::new().unwrap();

    group.bench_function("queued_8", |b| {
        let storage = Arc::new(MemoryStorage::new());
        let files = FileCoordinator::new(storage, encrypted())
            .with_config(CoordinatorConfig::new().dedup_writes(false));

        b.iter(|| {
            runtime.block_on(async {
                let saves: Vec<_> = (0..8)
                    .map(|i| files.save_async("slot", i, None))
                    .collect();
                for save in saves {
                    black_box(save.await.unwrap());
                }
            });
        });
    });

    group.finish();
}

criterion_group!(benches, bench_load, bench_save, bench_save_async);

criterion_main!(benches);
