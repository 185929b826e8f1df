//! Integration tests for ledger durability and debounce behaviour
//!
//! Run with: cargo test --package rollcall-storage --test ledger_durability

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;
use rollcall_core::{AttendanceMark, GuestId, Station};
use rollcall_storage::{AttendanceLedger, StorageConfig, SyncState};
use std::sync::Arc;
use tempfile::tempdir;
use tokio::io::AsyncWriteExt;

fn reception() -> Station {
    Station::new("Reception").unwrap()
}

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_740_000_000 + secs, 0).unwrap()
}

#[tokio::test]
async fn test_pending_entry_survives_restart() {
    let dir = tempdir().unwrap();
    let config = StorageConfig::new(dir.path());

    let entry_id = {
        let ledger = AttendanceLedger::open(&config).await.unwrap();
        let outcome = ledger
            .append(
                GuestId::from(1001),
                reception(),
                AttendanceMark::Present,
                at(0),
            )
            .await
            .unwrap();
        outcome.entry().entry_id
        // dropped without any shutdown step
    };

    let reopened = AttendanceLedger::open(&config).await.unwrap();
    let entry = reopened.get(entry_id).await.unwrap();
    assert_eq!(entry.sync_state, SyncState::Pending);
    assert_eq!(entry.guest_id, GuestId::from(1001));
    assert_eq!(reopened.pending_count().await, 1);
}

#[tokio::test]
async fn test_sync_state_survives_restart() {
    let dir = tempdir().unwrap();
    let config = StorageConfig::new(dir.path());

    let (synced, failed) = {
        let ledger = AttendanceLedger::open(&config).await.unwrap();
        let a = ledger
            .append(GuestId::from(1), reception(), AttendanceMark::Present, at(0))
            .await
            .unwrap();
        let b = ledger
            .append(GuestId::from(2), reception(), AttendanceMark::Present, at(0))
            .await
            .unwrap();
        ledger.mark_synced(a.entry().entry_id).await.unwrap();
        ledger
            .mark_failed(b.entry().entry_id, "503", at(5))
            .await
            .unwrap();
        (a.entry().entry_id, b.entry().entry_id)
    };

    let reopened = AttendanceLedger::open(&config).await.unwrap();
    assert_eq!(
        reopened.get(synced).await.unwrap().sync_state,
        SyncState::Synced
    );

    let failed = reopened.get(failed).await.unwrap();
    assert_eq!(failed.sync_state, SyncState::Failed);
    assert_eq!(failed.sync_attempts, 1);
    assert_eq!(failed.last_error.as_deref(), Some("503"));
}

#[tokio::test]
async fn test_torn_final_line_is_skipped() {
    let dir = tempdir().unwrap();
    let config = StorageConfig::new(dir.path());

    {
        let ledger = AttendanceLedger::open(&config).await.unwrap();
        ledger
            .append(GuestId::from(1), reception(), AttendanceMark::Present, at(0))
            .await
            .unwrap();
    }

    // simulate a crash in the middle of the next append
    let mut file = tokio::fs::OpenOptions::new()
        .append(true)
        .open(config.ledger_path())
        .await
        .unwrap();
    file.write_all(br#"{"op":"append","entry":{"entry_id":"#)
        .await
        .unwrap();
    drop(file);

    let ledger = AttendanceLedger::open(&config).await.unwrap();
    assert_eq!(ledger.entries().await.len(), 1);

    // the repaired journal accepts new appends cleanly
    ledger
        .append(GuestId::from(2), reception(), AttendanceMark::Present, at(1))
        .await
        .unwrap();
    let reopened = AttendanceLedger::open(&config).await.unwrap();
    assert_eq!(reopened.entries().await.len(), 2);
}

#[tokio::test]
async fn test_concurrent_appends_are_serialized() {
    let dir = tempdir().unwrap();
    let config = StorageConfig::new(dir.path());
    let ledger = Arc::new(AttendanceLedger::open(&config).await.unwrap());

    let mut handles = Vec::new();
    for i in 0..20u64 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger
                .append(GuestId::from(i), reception(), AttendanceMark::Present, at(0))
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_recorded());
    }

    let reopened = AttendanceLedger::open(&config).await.unwrap();
    assert_eq!(reopened.pending_count().await, 20);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// However scans are spaced, no two recorded entries for the same guest
    /// and station are within the debounce window of each other.
    #[test]
    fn prop_debounce_never_records_close_scans(offsets in prop::collection::vec(0i64..30, 1..12)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let dir = tempdir().unwrap();
            let config = StorageConfig::new(dir.path());
            let ledger = AttendanceLedger::open(&config).await.unwrap();

            let mut t = 0;
            for offset in &offsets {
                t += offset;
                ledger
                    .append(GuestId::from(1001), reception(), AttendanceMark::Present, at(t))
                    .await
                    .unwrap();
            }

            let mut times: Vec<_> = ledger
                .entries()
                .await
                .iter()
                .map(|e| e.detected_at)
                .collect();
            times.sort();

            assert!(!times.is_empty());
            for pair in times.windows(2) {
                assert!(pair[1] - pair[0] > Duration::seconds(5));
            }
        });
    }
}
