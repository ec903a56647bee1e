//! Integration tests for the sync coordinator.

mod common;

use common::{FakeRemote, FlakyStorage, NOW};
use pensebete_engine::{Change, OpKind, Operation, Table};
use pensebete_sync::{
    ConnectivityMonitor, DrainOutcome, DurableQueue, KeyValueStorage, ManualClock,
    MemoryStorage, MutationOutcome, RemoteError, SyncCoordinator, SyncError,
};
use serde_json::json;
use std::sync::Arc;

async fn coordinator(
    remote: &Arc<FakeRemote>,
    storage: Arc<dyn KeyValueStorage>,
    online: bool,
) -> SyncCoordinator {
    let queue = DurableQueue::load(storage).await.unwrap();
    SyncCoordinator::new(
        queue,
        remote.clone(),
        ConnectivityMonitor::new(online),
        Arc::new(ManualClock::new(NOW)),
    )
}

async fn queue_offline(coordinator: &SyncCoordinator, changes: Vec<Change>) -> Vec<Operation> {
    let mut ops = Vec::new();
    for change in changes {
        match coordinator.mutate(change).await.unwrap() {
            MutationOutcome::Queued { op } => ops.push(op),
            other => panic!("expected a queued change, got {:?}", other),
        }
    }
    ops
}

fn creates(n: usize) -> Vec<Change> {
    (0..n)
        .map(|i| Change::create(Table::ListItems, json!({"name": format!("item {}", i)})))
        .collect()
}

fn rejected() -> RemoteError {
    RemoteError::Rejected {
        status: 422,
        message: "name is required".into(),
    }
}

// ============================================================================
// Draining
// ============================================================================

#[tokio::test]
async fn offline_changes_drain_in_order() {
    let remote = FakeRemote::new();
    remote.insert_row(Table::ListItems, "i1", json!({"name": "Milk", "done": false}));
    remote.insert_row(Table::Folders, "f1", json!({"name": "Old"}));
    let sync = coordinator(&remote, Arc::new(MemoryStorage::new()), false).await;

    queue_offline(
        &sync,
        vec![
            Change::create(Table::Lists, json!({"name": "Groceries"})),
            Change::update(Table::ListItems, "i1", json!({"done": true})),
            Change::delete(Table::Folders, "f1"),
        ],
    )
    .await;
    assert_eq!(sync.pending_count().await, 3);
    assert_eq!(remote.calls(), 0);

    sync.connectivity().set_online(true);
    let report = sync.drain().await.unwrap();

    assert_eq!(report.outcome, DrainOutcome::Completed);
    assert_eq!(report.applied_count(), 3);
    assert_eq!(
        remote.log(),
        vec![
            "create lists row-1",
            "update list_items i1",
            "delete folders f1"
        ]
    );
    assert_eq!(
        remote.row(Table::ListItems, "i1"),
        Some(json!({"name": "Milk", "done": true}))
    );
    assert_eq!(remote.row(Table::Folders, "f1"), None);

    let status = sync.status();
    assert_eq!(status.pending_count, 0);
    assert_eq!(status.last_sync_at, Some(NOW));
    assert!(!status.is_syncing);
}

#[tokio::test]
async fn transient_failure_keeps_the_unapplied_suffix() {
    let remote = FakeRemote::new();
    let sync = coordinator(&remote, Arc::new(MemoryStorage::new()), false).await;
    let ops = queue_offline(&sync, creates(5)).await;

    remote.fail_call(2, RemoteError::Transient("timeout".into()));
    sync.connectivity().set_online(true);

    let report = sync.drain().await.unwrap();
    assert_eq!(report.applied_count(), 2);
    assert!(matches!(
        &report.outcome,
        DrainOutcome::Interrupted { op_id, .. } if op_id == ops[2].op_id()
    ));

    let pending = sync.pending_operations().await;
    assert_eq!(pending, ops[2..].to_vec());
    assert_eq!(
        sync.status().last_error.as_deref(),
        Some("remote store unavailable: timeout")
    );

    let report = sync.drain().await.unwrap();
    assert_eq!(report.outcome, DrainOutcome::Completed);
    assert_eq!(report.applied_count(), 3);
    assert_eq!(remote.row_count(), 5);
    assert_eq!(sync.status().last_error, None);
}

#[tokio::test]
async fn lost_acknowledgement_does_not_duplicate_create() {
    let remote = FakeRemote::new();
    let sync = coordinator(&remote, Arc::new(MemoryStorage::new()), true).await;
    remote.lose_ack(0);

    let outcome = sync
        .mutate(Change::create(Table::Lists, json!({"name": "Groceries"})))
        .await
        .unwrap();
    assert!(matches!(outcome, MutationOutcome::Queued { .. }));
    assert_eq!(remote.row_count(), 1);
    assert_eq!(sync.pending_count().await, 1);

    let report = sync.drain().await.unwrap();
    assert_eq!(report.outcome, DrainOutcome::Completed);
    assert!(report.applied[0].already_applied);
    assert_eq!(report.applied[0].record_id.as_deref(), Some("row-1"));
    assert_eq!(remote.row_count(), 1);
}

#[tokio::test]
async fn update_and_delete_of_missing_rows_count_as_applied() {
    let remote = FakeRemote::new();
    let sync = coordinator(&remote, Arc::new(MemoryStorage::new()), false).await;
    queue_offline(
        &sync,
        vec![
            Change::update(Table::Lists, "gone", json!({"name": "x"})),
            Change::delete(Table::SharedLists, "gone-too"),
        ],
    )
    .await;

    sync.connectivity().set_online(true);
    let report = sync.drain().await.unwrap();

    assert_eq!(report.outcome, DrainOutcome::Completed);
    assert_eq!(report.applied_count(), 2);
    assert!(report.applied.iter().all(|applied| applied.already_applied));
    assert_eq!(report.applied[1].kind, OpKind::Delete);
    assert_eq!(sync.pending_count().await, 0);
}

#[tokio::test]
async fn drain_while_offline_does_nothing() {
    let remote = FakeRemote::new();
    let sync = coordinator(&remote, Arc::new(MemoryStorage::new()), false).await;
    queue_offline(&sync, creates(1)).await;

    let report = sync.drain().await.unwrap();

    assert_eq!(report.outcome, DrainOutcome::Offline);
    assert_eq!(remote.calls(), 0);
    assert_eq!(sync.status().last_sync_at, None);
}

#[tokio::test]
async fn concurrent_drain_is_a_no_op() {
    let remote = FakeRemote::new();
    let sync = Arc::new(coordinator(&remote, Arc::new(MemoryStorage::new()), false).await);
    queue_offline(&sync, creates(1)).await;
    sync.connectivity().set_online(true);

    let gate = remote.hold_calls();
    let first = {
        let sync = Arc::clone(&sync);
        tokio::spawn(async move { sync.drain().await })
    };
    remote.call_entered().await;

    assert!(sync.status().is_syncing);
    let second = sync.drain().await.unwrap();
    assert_eq!(second.outcome, DrainOutcome::AlreadyRunning);
    assert!(second.applied.is_empty());

    gate.notify_one();
    let first = first.await.unwrap().unwrap();
    assert_eq!(first.outcome, DrainOutcome::Completed);
    assert_eq!(remote.calls(), 1);
    assert!(!sync.status().is_syncing);
}

// ============================================================================
// Mutations
// ============================================================================

#[tokio::test]
async fn online_mutation_syncs_immediately() {
    let remote = FakeRemote::new();
    let sync = coordinator(&remote, Arc::new(MemoryStorage::new()), true).await;

    let outcome = sync
        .mutate(Change::create(Table::Lists, json!({"name": "Groceries"})))
        .await
        .unwrap();

    match outcome {
        MutationOutcome::Synced { op, record_id } => {
            assert_eq!(op.kind(), OpKind::Create);
            assert_eq!(record_id.as_deref(), Some("row-1"));
        }
        other => panic!("expected a synced change, got {:?}", other),
    }
    assert_eq!(sync.pending_count().await, 0);
}

#[tokio::test]
async fn online_mutation_goes_behind_earlier_changes() {
    let remote = FakeRemote::new();
    remote.insert_row(Table::Lists, "l1", json!({"name": "A"}));
    let monitor = ConnectivityMonitor::new(false);
    let sync = SyncCoordinator::new(
        DurableQueue::load(Arc::new(MemoryStorage::new())).await.unwrap(),
        remote.clone(),
        monitor.clone(),
        Arc::new(ManualClock::new(NOW)),
    );

    sync.mutate(Change::update(Table::Lists, "l1", json!({"name": "B"})))
        .await
        .unwrap();
    monitor.set_online(true);
    let outcome = sync
        .mutate(Change::update(Table::Lists, "l1", json!({"name": "C"})))
        .await
        .unwrap();

    assert!(matches!(outcome, MutationOutcome::Synced { .. }));
    assert_eq!(remote.row(Table::Lists, "l1"), Some(json!({"name": "C"})));
    assert_eq!(remote.log().len(), 2);
}

#[tokio::test]
async fn storage_failure_is_reported_and_nothing_is_queued() {
    let remote = FakeRemote::new();
    let storage = FlakyStorage::new();
    let sync = coordinator(&remote, Arc::new(storage.clone()), true).await;
    storage.fail_writes(true);

    let err = sync
        .mutate(Change::create(Table::Lists, json!({"name": "Groceries"})))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Storage(_)));
    assert_eq!(sync.pending_count().await, 0);
    assert_eq!(remote.calls(), 0);
}

#[tokio::test]
async fn status_subscribers_see_pending_count() {
    let remote = FakeRemote::new();
    let sync = coordinator(&remote, Arc::new(MemoryStorage::new()), false).await;
    let mut rx = sync.subscribe();

    queue_offline(&sync, creates(2)).await;

    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().pending_count, 2);
}

#[tokio::test]
async fn clear_drops_everything() {
    let remote = FakeRemote::new();
    let storage = MemoryStorage::new();
    let sync = coordinator(&remote, Arc::new(storage.clone()), false).await;
    queue_offline(&sync, creates(3)).await;

    sync.clear().await.unwrap();
    assert_eq!(sync.pending_count().await, 0);

    let restarted = coordinator(&remote, Arc::new(storage), true).await;
    assert_eq!(restarted.pending_count().await, 0);
}

// ============================================================================
// Rejections
// ============================================================================

#[tokio::test]
async fn rejection_blocks_until_discarded() {
    let remote = FakeRemote::new();
    let sync = coordinator(&remote, Arc::new(MemoryStorage::new()), false).await;
    let ops = queue_offline(&sync, creates(2)).await;
    remote.fail_call(0, rejected());
    sync.connectivity().set_online(true);

    let report = sync.drain().await.unwrap();
    match &report.outcome {
        DrainOutcome::Blocked { op_id, rejection } => {
            assert_eq!(op_id, ops[0].op_id());
            assert_eq!(rejection.status, Some(422));
            assert_eq!(rejection.reason, "name is required");
        }
        other => panic!("expected a blocked drain, got {:?}", other),
    }
    let blocked = sync.status().blocked.unwrap();
    assert_eq!(&blocked.op_id, ops[0].op_id());

    // Blocked passes do not replay the rejected operation
    let report = sync.drain().await.unwrap();
    assert!(matches!(report.outcome, DrainOutcome::Blocked { .. }));
    assert_eq!(remote.calls(), 1);
    assert_eq!(sync.pending_count().await, 2);

    assert!(sync.discard(ops[0].op_id()).await.unwrap());
    assert!(sync.status().blocked.is_none());

    let report = sync.drain().await.unwrap();
    assert_eq!(report.outcome, DrainOutcome::Completed);
    assert_eq!(report.applied[0].op_id, *ops[1].op_id());
    assert_eq!(remote.row_count(), 1);
}

#[tokio::test]
async fn retry_replays_the_rejected_operation() {
    let remote = FakeRemote::new();
    let sync = coordinator(&remote, Arc::new(MemoryStorage::new()), false).await;
    let ops = queue_offline(&sync, creates(1)).await;
    remote.fail_call(0, rejected());
    sync.connectivity().set_online(true);

    sync.drain().await.unwrap();
    let report = sync.retry(ops[0].op_id()).await.unwrap();

    assert_eq!(report.outcome, DrainOutcome::Completed);
    assert_eq!(remote.calls(), 2);
    assert_eq!(sync.pending_count().await, 0);
}

#[tokio::test]
async fn rejection_survives_restart() {
    let remote = FakeRemote::new();
    let storage = MemoryStorage::new();
    let ops = {
        let sync = coordinator(&remote, Arc::new(storage.clone()), false).await;
        let ops = queue_offline(&sync, creates(1)).await;
        remote.fail_call(0, rejected());
        sync.connectivity().set_online(true);
        sync.drain().await.unwrap();
        ops
    };

    let restarted = coordinator(&remote, Arc::new(storage), true).await;
    assert_eq!(
        restarted.status().blocked.map(|b| b.op_id),
        Some(ops[0].op_id().clone())
    );

    let report = restarted.drain().await.unwrap();
    assert!(matches!(report.outcome, DrainOutcome::Blocked { .. }));
    assert_eq!(remote.calls(), 1);
}
