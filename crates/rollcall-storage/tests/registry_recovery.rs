//! Integration tests for registry fail-closed registration and recovery
//!
//! Run with: cargo test --package rollcall-storage --test registry_recovery

use rollcall_core::{GuestId, TagUid};
use rollcall_storage::{RegistrySource, StorageConfig, StorageError, TagRegistry};
use tempfile::tempdir;

fn uid(s: &str) -> TagUid {
    TagUid::new(s).unwrap()
}

#[tokio::test]
async fn test_register_fails_closed() {
    let dir = tempdir().unwrap();
    let config = StorageConfig::new(dir.path());
    let registry = TagRegistry::open(&config).await.unwrap();

    registry
        .register(uid("04A1"), GuestId::from(1001))
        .await
        .unwrap();
    let err = registry
        .register(uid("04A1"), GuestId::from(2002))
        .await
        .unwrap_err();

    match err {
        StorageError::AlreadyRegistered { tag_uid, existing } => {
            assert_eq!(tag_uid, uid("04A1"));
            assert_eq!(existing, GuestId::from(1001));
        }
        other => panic!("unexpected error: {other}"),
    }

    // the refusal is durable too
    let reopened = TagRegistry::open(&config).await.unwrap();
    assert_eq!(
        reopened.lookup(&uid("04A1")).await,
        Some(GuestId::from(1001))
    );
}

#[tokio::test]
async fn test_corrupt_primary_recovers_from_backup() {
    let dir = tempdir().unwrap();
    let config = StorageConfig::new(dir.path());

    {
        let registry = TagRegistry::open(&config).await.unwrap();
        registry
            .register(uid("04A1"), GuestId::from(1001))
            .await
            .unwrap();
        registry
            .register(uid("04B2"), GuestId::from(1002))
            .await
            .unwrap();
    }

    tokio::fs::write(config.registry_path(), b"{\"version\": 1, \"tags\": {")
        .await
        .unwrap();

    let registry = TagRegistry::open(&config).await.unwrap();
    assert_eq!(registry.source(), RegistrySource::Backup);
    assert!(registry.is_degraded());
    assert_eq!(registry.len().await, 2);
    assert_eq!(
        registry.lookup(&uid("04B2")).await,
        Some(GuestId::from(1002))
    );

    // primary is rewritten, next open is clean
    let reopened = TagRegistry::open(&config).await.unwrap();
    assert_eq!(reopened.source(), RegistrySource::Primary);
    assert_eq!(reopened.len().await, 2);
}

#[tokio::test]
async fn test_corrupt_file_is_set_aside() {
    let dir = tempdir().unwrap();
    let config = StorageConfig::new(dir.path());
    tokio::fs::write(config.registry_path(), b"garbage")
        .await
        .unwrap();

    let registry = TagRegistry::open(&config).await.unwrap();
    assert_eq!(registry.source(), RegistrySource::Reset);
    assert!(registry.is_empty().await);

    let mut names = Vec::new();
    let mut dir_entries = tokio::fs::read_dir(dir.path()).await.unwrap();
    while let Some(entry) = dir_entries.next_entry().await.unwrap() {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    assert!(names.iter().any(|n| n.starts_with("registry.json.corrupt-")));
}

#[tokio::test]
async fn test_missing_primary_uses_backup() {
    let dir = tempdir().unwrap();
    let config = StorageConfig::new(dir.path());

    {
        let registry = TagRegistry::open(&config).await.unwrap();
        registry
            .register(uid("04A1"), GuestId::from(1001))
            .await
            .unwrap();
    }
    tokio::fs::remove_file(config.registry_path()).await.unwrap();

    let registry = TagRegistry::open(&config).await.unwrap();
    assert_eq!(registry.source(), RegistrySource::Backup);
    assert_eq!(
        registry.lookup(&uid("04A1")).await,
        Some(GuestId::from(1001))
    );
}

#[tokio::test]
async fn test_rewrite_releases_old_tag_durably() {
    let dir = tempdir().unwrap();
    let config = StorageConfig::new(dir.path());

    {
        let registry = TagRegistry::open(&config).await.unwrap();
        registry
            .register(uid("04A1"), GuestId::from(1001))
            .await
            .unwrap();

        let err = registry
            .register(uid("04B2"), GuestId::from(1001))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::GuestAlreadyBound { .. }));

        registry
            .rewrite(uid("04B2"), GuestId::from(1001))
            .await
            .unwrap();
    }

    let reopened = TagRegistry::open(&config).await.unwrap();
    assert_eq!(reopened.source(), RegistrySource::Primary);
    assert_eq!(reopened.len().await, 1);
    assert_eq!(reopened.lookup(&uid("04A1")).await, None);
    assert_eq!(
        reopened.tag_for(&GuestId::from(1001)).await,
        Some(uid("04B2"))
    );
}
