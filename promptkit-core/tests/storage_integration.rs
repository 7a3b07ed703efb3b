mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{fast_config, file_storage, memory_storage, FlakyReads, StoredPrompt};
use futures::future::join_all;
use promptkit_core::storage::{MemoryStore, SafeStorage, StorageConfig, StorageError};
use serde_json::json;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_increments_are_not_lost() {
    let (_store, storage) = memory_storage();

    let updates = (0..50).map(|_| {
        let storage = storage.clone();
        tokio::spawn(async move {
            storage
                .atomic_update("counter", |current: Option<u64>| async move {
                    tokio::task::yield_now().await;
                    current.unwrap_or(0) + 1
                })
                .await
        })
    });
    for result in join_all(updates).await {
        result.expect("task panicked").expect("update failed");
    }

    assert_eq!(storage.read::<u64>("counter").await, Some(50));
    assert_eq!(storage.locks().pending_len(), 0);
}

#[tokio::test]
async fn test_concurrent_appends_keep_every_record() {
    let (_store, storage) = memory_storage();

    let appends = (0..20).map(|i| {
        let storage = storage.clone();
        async move {
            storage
                .atomic_update("prompts", move |current: Option<Vec<StoredPrompt>>| async move {
                    let mut prompts = current.unwrap_or_default();
                    prompts.push(StoredPrompt::new(i.to_string(), format!("prompt {i}")));
                    prompts
                })
                .await
        }
    });
    for result in join_all(appends).await {
        result.expect("append failed");
    }

    let prompts: Vec<StoredPrompt> = storage.read("prompts").await.expect("prompts exist");
    assert_eq!(prompts.len(), 20);
}

#[tokio::test]
async fn test_failed_verification_restores_previous_value() {
    let (store, storage) = memory_storage();
    let original = vec![StoredPrompt::new("1", "keep me")];
    storage
        .write("prompts", original.clone())
        .await
        .expect("initial write");

    store.corrupt_next_sets("prompts", 3);
    let failure = storage
        .atomic_update("prompts", |current: Option<Vec<StoredPrompt>>| async move {
            let mut prompts = current.unwrap_or_default();
            prompts.push(StoredPrompt::new("2", "lost"));
            prompts
        })
        .await
        .expect_err("write must fail");

    assert!(failure.recovered_from_backup);
    assert!(matches!(
        failure.error,
        StorageError::VerificationFailed { attempts: 3, .. }
    ));
    assert_eq!(
        storage.read::<Vec<StoredPrompt>>("prompts").await,
        Some(original)
    );
}

#[tokio::test]
async fn test_quota_failure_is_immediate() {
    let store = Arc::new(MemoryStore::with_quota(64));
    let config = StorageConfig::default().with_retry_delay(Duration::from_secs(1));
    let storage = SafeStorage::with_config(store.clone(), config);

    let started = Instant::now();
    let failure = storage
        .write("big", vec!["x".repeat(100)])
        .await
        .expect_err("quota must be hit");

    assert_eq!(failure.error, StorageError::QuotaExceeded);
    assert!(!failure.recovered_from_backup);
    assert_eq!(store.set_count("big"), 1);
    assert!(started.elapsed() < Duration::from_millis(500));
}

#[tokio::test]
async fn test_separate_instances_do_not_share_locks() {
    let store = Arc::new(MemoryStore::new());
    let a = SafeStorage::with_config(store.clone(), fast_config());
    let b = SafeStorage::with_config(store, fast_config());

    let _held = a.locks().acquire("k").await;
    let write = tokio::time::timeout(Duration::from_millis(200), b.write("k", 1)).await;
    assert!(write.expect("not blocked by other instance").is_ok());

    let blocked = tokio::time::timeout(Duration::from_millis(50), a.write("k", 2)).await;
    assert!(blocked.is_err());
}

#[tokio::test]
async fn test_unreadable_store_reads_as_absent() {
    let store = Arc::new(FlakyReads::new());
    let storage = SafeStorage::with_config(store.clone(), fast_config());
    storage.write("theme", "dark").await.expect("write");

    store.set_failing(true);
    assert_eq!(storage.read::<String>("theme").await, None);
    assert!(!storage.is_storage_low().await);
    assert!(storage.stats().await.is_err());

    store.set_failing(false);
    assert_eq!(storage.read::<String>("theme").await.as_deref(), Some("dark"));
}

#[tokio::test]
async fn test_file_backed_storage_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("storage.json");

    let storage = file_storage(&path);
    storage
        .atomic_update("prompts", |current: Option<Vec<StoredPrompt>>| async move {
            let mut prompts = current.unwrap_or_default();
            prompts.push(StoredPrompt::new("a", "first"));
            prompts
        })
        .await
        .expect("first append");
    storage
        .atomic_update("prompts", |current: Option<Vec<StoredPrompt>>| async move {
            let mut prompts = current.unwrap_or_default();
            prompts.push(StoredPrompt::new("b", "second"));
            prompts
        })
        .await
        .expect("second append");

    // Let the delayed backup cleanup run.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let reopened = file_storage(&path);
    let exported = reopened.export_all().await.expect("export");
    assert_eq!(exported.len(), 1);
    assert_eq!(exported["prompts"].as_array().map(Vec::len), Some(2));
    assert!(!exported.contains_key("_backup_prompts"));

    let raw = std::fs::read_to_string(&path).expect("store file");
    assert!(!raw.contains("_backup_prompts"));
}

#[tokio::test]
async fn test_export_import_between_stores() {
    let (_source_store, source) = memory_storage();
    source.write("prompts", json!([{"id": "1", "text": "hi"}])).await.expect("write");
    source.write("prompts", json!([{"id": "1", "text": "hello"}])).await.expect("write");
    source.write("settings", json!({"theme": "dark"})).await.expect("write");

    let exported = source.export_all().await.expect("export");
    assert_eq!(exported.len(), 2);

    let (target_store, target) = memory_storage();
    assert_eq!(target.import_all(exported).await.expect("import"), 2);
    assert_eq!(target_store.len(), 2);
    assert_eq!(
        target.read_value("settings").await,
        Some(json!({"theme": "dark"}))
    );
}
