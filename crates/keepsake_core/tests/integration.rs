//! Integration tests for the coordinator over real and instrumented storage.

use keepsake_codec::{CodecError, SerializationResolver, SerializerConfig};
use keepsake_core::{
    CoordinatorConfig, DefaultedFile, FileCoordinator, LoadState, ProgressAggregator,
    ShutdownVeto,
};
use async_trait::async_trait;
use keepsake_storage::{
    FileStorage, LoadResult, MemoryPreferences, MemoryStorage, PreferenceStore, PrefsStorage,
    StorageError, StorageResolver, StorageResult, WriteEvent,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct SaveData {
    guid: String,
    #[serde(rename = "SoundManager.volume")]
    sound_volume: f32,
    #[serde(rename = "MusicManager.volume")]
    music_volume: f32,
}

fn sample() -> SaveData {
    SaveData {
        guid: "d1dbd0bd-11c5-4067-aebf-319ca7da2808".into(),
        sound_volume: 0.0,
        music_volume: 0.0,
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A medium whose asynchronous writes block a pool thread for a while.
#[derive(Default)]
struct SlowDisk {
    files: Mutex<HashMap<String, Vec<u8>>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl SlowDisk {
    const WRITE_TIME: Duration = Duration::from_millis(150);

    fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn has(&self, filename: &str) -> bool {
        self.files.lock().contains_key(filename)
    }
}

#[async_trait]
impl StorageResolver for SlowDisk {
    fn any_exist(&self, filenames: &[&str]) -> bool {
        filenames.iter().any(|name| self.has(name))
    }

    fn load_bytes(&self, filename: &str) -> LoadResult<Vec<u8>> {
        match self.files.lock().get(filename) {
            Some(data) => LoadResult::Succeeded(data.clone()),
            None => LoadResult::not_found(),
        }
    }

    fn save_bytes(&self, filename: &str, data: &[u8]) -> StorageResult<()> {
        self.files.lock().insert(filename.to_owned(), data.to_vec());
        Ok(())
    }

    fn delete(&self, filename: &str) -> StorageResult<()> {
        self.files.lock().remove(filename);
        Ok(())
    }

    async fn save_bytes_async(&self, filename: &str, data: &[u8]) -> StorageResult<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let written = tokio::task::spawn_blocking(|| std::thread::sleep(Self::WRITE_TIME)).await;
        self.files.lock().insert(filename.to_owned(), data.to_vec());

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        written.map_err(|e| StorageError::Task(e.to_string()))
    }
}

fn encrypted_config() -> SerializerConfig {
    SerializerConfig::encrypted("hogehogefugafuga", "piyopiyohogehoge", 1000)
}

fn coordinator(storage: Arc<dyn StorageResolver>, config: SerializerConfig) -> FileCoordinator {
    FileCoordinator::new(storage, SerializationResolver::new(config).unwrap())
}

#[test]
fn file_storage_roundtrip_encrypted() {
    init_tracing();
    let dir = tempdir().unwrap();
    let storage = Arc::new(FileStorage::with_subdirectory(dir.path(), "saves"));
    let files = coordinator(storage, encrypted_config());

    let bytes = files.save("slot1.sav", &sample()).unwrap();
    let on_disk = fs::read(dir.path().join("saves/slot1.sav")).unwrap();
    assert_eq!(on_disk, bytes);

    // A fresh coordinator has to go to disk.
    let storage = Arc::new(FileStorage::with_subdirectory(dir.path(), "saves"));
    let reopened = coordinator(storage, encrypted_config());
    assert_eq!(reopened.load::<SaveData>("slot1.sav").into_value(), Some(sample()));
}

#[test]
fn missing_file_is_not_found() {
    init_tracing();
    let dir = tempdir().unwrap();
    let storage = FileStorage::new(dir.path());

    assert_eq!(storage.load_bytes("nope.sav").state(), LoadState::NotFound);

    let files = coordinator(Arc::new(storage), encrypted_config());
    assert_eq!(files.load::<SaveData>("nope.sav").state(), LoadState::NotFound);
}

#[test]
fn corrupted_record_is_failed_deserialize() {
    init_tracing();
    let dir = tempdir().unwrap();
    let files = coordinator(Arc::new(FileStorage::new(dir.path())), encrypted_config());
    files.save("slot.sav", &sample()).unwrap();

    let path = dir.path().join("slot.sav");
    let mut bytes = fs::read(&path).unwrap();
    bytes[0] ^= 0xff;
    fs::write(&path, bytes).unwrap();

    let reopened = coordinator(Arc::new(FileStorage::new(dir.path())), encrypted_config());
    let result = reopened.load::<SaveData>("slot.sav");

    assert_eq!(result.state(), LoadState::FailedDeserialize);
    let cause = result.cause().unwrap();
    assert!(matches!(
        cause.downcast_ref::<CodecError>(),
        Some(CodecError::BothStrategiesFailed { .. })
    ));
}

#[test]
fn legacy_record_loads_through_coordinator() {
    init_tracing();
    let legacy = SerializationResolver::new(encrypted_config())
        .unwrap()
        .serialize_legacy(&sample())
        .unwrap();
    let storage = Arc::new(MemoryStorage::with_file("old.sav", legacy));
    let files = coordinator(storage.clone(), encrypted_config());

    assert_eq!(files.load::<SaveData>("old.sav").into_value(), Some(sample()));

    // Saving again upgrades the record to the current layout.
    files.save("old.sav", &sample()).unwrap();
    let upgraded = storage.file("old.sav").unwrap();
    let decoded = files
        .serializer()
        .deserialize_detailed::<SaveData>(&upgraded)
        .unwrap();
    assert_eq!(decoded.format, keepsake_codec::RecordFormat::Current);
}

#[test]
fn cache_survives_storage_delete_until_pseudo_delete() {
    init_tracing();
    let storage = Arc::new(MemoryStorage::new());
    let files = coordinator(storage.clone(), SerializerConfig::compressed(true));

    files.save("a", &sample()).unwrap();
    storage.remove_file("a");
    assert!(files.load::<SaveData>("a").is_succeeded());
    assert_eq!(storage.load_count(), 0);

    files.pseudo_delete("a");
    assert!(files.load::<SaveData>("a").is_not_found());
}

#[test]
fn preferences_backed_coordinator() {
    init_tracing();
    let storage = Arc::new(PrefsStorage::new(MemoryPreferences::new()));
    let files = coordinator(storage.clone(), encrypted_config());

    files.save("progress", &sample()).unwrap();
    assert!(storage.store().has_key("progress"));

    let reopened = coordinator(storage, encrypted_config());
    assert_eq!(reopened.load::<SaveData>("progress").into_value(), Some(sample()));
}

#[tokio::test]
async fn overlapping_saves_commit_in_issue_order() {
    init_tracing();
    let storage = Arc::new(MemoryStorage::new().with_write_delay(Duration::from_millis(20)));
    let files = coordinator(storage.clone(), encrypted_config());

    let first = files.save_async("A", sample(), None);
    let second = files.save_async("B", SaveData::default(), None);
    // Poll the later save first; issue order still wins.
    let (b, a) = tokio::join!(second, first);
    a.unwrap();
    b.unwrap();

    assert_eq!(
        storage.events(),
        vec![
            WriteEvent::Started("A".into()),
            WriteEvent::Finished("A".into()),
            WriteEvent::Started("B".into()),
            WriteEvent::Finished("B".into()),
        ]
    );
    assert_eq!(storage.peak_in_flight(), 1);
}

#[tokio::test]
async fn many_concurrent_saves_never_overlap() {
    init_tracing();
    let storage = Arc::new(MemoryStorage::new().with_write_delay(Duration::from_millis(2)));
    let files = Arc::new(coordinator(storage.clone(), SerializerConfig::compressed(true)));

    let mut tasks = Vec::new();
    for i in 0..16u32 {
        let files = Arc::clone(&files);
        tasks.push(tokio::spawn(async move {
            files.save_async(&format!("slot{}", i % 4), i, None).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(storage.peak_in_flight(), 1);
    assert_eq!(storage.write_count(), 16);
}

#[tokio::test]
async fn identical_async_saves_write_once() {
    init_tracing();
    let storage = Arc::new(MemoryStorage::new());
    let files = coordinator(storage.clone(), SerializerConfig::new());

    let first = files.save_async("a", sample(), None).await.unwrap();
    let second = files.save_async("a", sample(), None).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(storage.write_count(), 1);
}

#[tokio::test]
async fn write_in_progress_blocks_shutdown() {
    init_tracing();
    let veto = ShutdownVeto::new();
    let storage = Arc::new(MemoryStorage::new().with_write_delay(Duration::from_millis(100)));
    let files = Arc::new(
        coordinator(storage.clone(), SerializerConfig::new()).with_veto(veto.clone()),
    );

    let writer = {
        let files = Arc::clone(&files);
        tokio::spawn(async move { files.save_async("a", sample(), None).await })
    };

    tokio::time::timeout(Duration::from_secs(1), async {
        while storage.events().is_empty() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();
    assert!(!veto.request_quit());

    veto.wait_idle().await;
    writer.await.unwrap().unwrap();
    assert!(veto.request_quit());
}

#[tokio::test]
async fn failed_async_save_releases_veto_and_queue() {
    init_tracing();
    let storage = Arc::new(MemoryStorage::new());
    let files = coordinator(storage.clone(), SerializerConfig::new());
    storage.fail_next_saves(1);

    assert!(files.save_async("a", 1, None).await.is_err());
    assert!(!files.veto().is_blocked());

    files.save_async("a", 2, None).await.unwrap();
    assert_eq!(files.load::<i32>("a").into_value(), Some(2));
}

#[tokio::test]
async fn progress_aggregates_across_saves() {
    init_tracing();
    let storage = Arc::new(MemoryStorage::new());
    let files = coordinator(storage, SerializerConfig::new());
    let bar = ProgressAggregator::new();

    let a = bar.add();
    let b = bar.add();
    files
        .save_async("a", 1, Some(&*a))
        .await
        .unwrap();
    assert_eq!(bar.progress(), 0.5);

    let loaded = files.load_async::<i32>("a", Some(&*b)).await;
    assert!(loaded.is_succeeded());
    assert_eq!(bar.progress(), 1.0);
}

#[tokio::test]
async fn uncached_coordinator_reads_file_storage() {
    init_tracing();
    let dir = tempdir().unwrap();
    let storage = Arc::new(FileStorage::new(dir.path()));
    let files = coordinator(storage, SerializerConfig::compressed(true))
        .with_config(CoordinatorConfig::new().cache_enabled(false));

    files.save_async("a.sav", sample(), None).await.unwrap();
    fs::remove_file(dir.path().join("a.sav")).unwrap();

    assert!(files.load_async::<SaveData>("a.sav", None).await.is_not_found());
}

#[tokio::test]
async fn defaulted_file_over_file_storage() {
    init_tracing();
    let dir = tempdir().unwrap();
    let files = Arc::new(coordinator(
        Arc::new(FileStorage::new(dir.path())),
        encrypted_config(),
    ));

    let mut data = DefaultedFile::<SaveData>::new("data.sav", Arc::clone(&files));
    assert_eq!(*data.load_async(None).await, SaveData::default());

    data.set(sample());
    data.save_async(None).await.unwrap();
    files.flush().await;

    assert!(dir.path().join("data.sav").is_file());
}

#[tokio::test]
async fn sync_save_waits_for_earlier_async_save() {
    init_tracing();
    let storage = Arc::new(MemoryStorage::new().with_write_delay(Duration::from_millis(50)));
    let files = Arc::new(coordinator(storage.clone(), SerializerConfig::new()));

    let earlier = files.save_async("f", 1, None);
    let later = {
        let files = Arc::clone(&files);
        tokio::task::spawn_blocking(move || files.save("f", &2))
    };
    let (earlier, later) = tokio::join!(earlier, later);
    earlier.unwrap();
    later.unwrap().unwrap();

    assert_eq!(storage.file("f"), Some(files.serializer().serialize(&2).unwrap()));
    assert_eq!(files.load::<i32>("f").into_value(), Some(2));
    assert_eq!(storage.peak_in_flight(), 1);
}

#[tokio::test]
async fn dropped_save_finishes_its_write_before_the_next() {
    init_tracing();
    let storage = Arc::new(SlowDisk::default());
    let files = coordinator(storage.clone(), SerializerConfig::new());

    let mut first = Box::pin(files.save_async("a", 1, None));
    tokio::select! {
        _ = &mut first => panic!("write finished before it was observed"),
        _ = async {
            while storage.in_flight() == 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        } => {}
    }
    drop(first);

    // The write is still running and still holds shutdown off.
    assert_eq!(storage.in_flight(), 1);
    assert!(files.veto().is_blocked());
    assert!(!files.veto().request_quit());

    files.save_async("b", 2, None).await.unwrap();

    assert_eq!(storage.peak(), 1);
    assert!(storage.has("a"));
    assert!(storage.has("b"));
    assert_eq!(files.load::<i32>("a").into_value(), Some(1));
    assert!(!files.veto().is_blocked());
}
