//! Integration tests for the optimistic task board and its sync worker,
//! run against the in-process stub remote.

mod common;

use std::sync::Arc;

use std::time::Duration;

use rstest::rstest;

use common::{Call, StubTaskApi};
use todo_sync::client::{
    KeyValueStore, MemoryStore, OUTBOX_KEY, Outbox, PendingOp, SyncHandle, TaskBoard, TaskMirror,
};
use todo_sync::domain::{Category, Task, TaskId, TaskPatch, TaskValidationError, Timestamp};

fn board_with(api: &StubTaskApi, store: &Arc<MemoryStore>) -> TaskBoard {
    TaskBoard::new(Arc::new(api.clone()), store.clone())
}

fn stored_task(description: &str, category: Category) -> Task {
    Task::new(TaskId::generate(), description, category, Timestamp::now())
}

// =============================================================================
// Mounting
// =============================================================================

mod mount {
    use super::*;

    #[rstest]
    #[tokio::test]
    async fn mount_replaces_local_copy_with_server_tasks() {
        let api = StubTaskApi::online();
        let on_server = stored_task("Buy milk", Category::Personal);
        api.seed(on_server.clone()).await;

        let store = Arc::new(MemoryStore::new());
        TaskMirror::new(store.clone())
            .save(&[stored_task("Stale", Category::Professional)])
            .unwrap();

        let mut board = board_with(&api, &store);
        board.mount().await;

        assert_eq!(board.tasks(), &[on_server.clone()]);
        assert!(!board.is_loading());
        assert_eq!(TaskMirror::new(store).load(), vec![on_server]);
    }

    #[rstest]
    #[tokio::test]
    async fn mount_offline_keeps_mirror_and_sets_no_error() {
        let api = StubTaskApi::offline();
        let store = Arc::new(MemoryStore::new());
        let mirrored = vec![
            stored_task("Buy milk", Category::Personal),
            stored_task("Write report", Category::Professional),
        ];
        TaskMirror::new(store.clone()).save(&mirrored).unwrap();

        let mut board = board_with(&api, &store);
        board.mount().await;

        assert_eq!(board.tasks(), mirrored.as_slice());
        assert_eq!(board.error(), None);
        assert!(!board.is_loading());
    }

    #[rstest]
    #[tokio::test]
    async fn mount_runs_once() {
        let api = StubTaskApi::online();
        let store = Arc::new(MemoryStore::new());

        let mut board = board_with(&api, &store);
        board.mount().await;
        board.mount().await;

        let lists = api.calls().iter().filter(|call| **call == Call::List).count();
        assert_eq!(lists, 1);
    }

    #[rstest]
    #[tokio::test]
    async fn loading_flag_is_raised_during_reload() {
        let api = StubTaskApi::online();
        let store = Arc::new(MemoryStore::new());
        let mut board = board_with(&api, &store);

        let mut loading = board.subscribe_loading();
        let watcher = tokio::spawn(async move {
            loading.wait_for(|busy| *busy).await.is_ok()
        });

        board.mount().await;

        let saw_loading = tokio::time::timeout(Duration::from_secs(1), watcher)
            .await
            .expect("loading flag was never raised")
            .unwrap();
        assert!(saw_loading);
        assert!(!board.is_loading());
    }
}

// =============================================================================
// Mutations
// =============================================================================

mod mutations {
    use super::*;

    #[rstest]
    #[tokio::test]
    async fn add_task_is_local_first_and_reaches_server_with_same_id() {
        let api = StubTaskApi::online();
        let store = Arc::new(MemoryStore::new());
        let mut board = board_with(&api, &store);
        board.mount().await;

        let id = board.add_task("Buy milk", Category::Personal).unwrap();

        let local = board.task(&id).unwrap().clone();
        assert_eq!(local.description, "Buy milk");
        assert!(!local.completed);
        assert_eq!(TaskMirror::new(store.clone()).load(), vec![local]);

        board.settle().await;
        let server = api.server_tasks().await;
        assert_eq!(server.len(), 1);
        assert_eq!(server[0].id, id);
        assert_eq!(board.pending_sync(), 0);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[tokio::test]
    async fn add_task_rejects_blank_description(#[case] description: &str) {
        let api = StubTaskApi::online();
        let store = Arc::new(MemoryStore::new());
        let mut board = board_with(&api, &store);
        board.mount().await;

        let result = board.add_task(description, Category::Personal);

        assert_eq!(result, Err(TaskValidationError::EmptyDescription));
        assert_eq!(board.error(), Some("Description cannot be empty"));
        assert!(board.tasks().is_empty());
        board.settle().await;
        assert!(!api.calls().iter().any(|call| matches!(call, Call::Create(_))));
    }

    #[rstest]
    #[tokio::test]
    async fn successful_mutation_clears_error() {
        let api = StubTaskApi::online();
        let store = Arc::new(MemoryStore::new());
        let mut board = board_with(&api, &store);

        assert!(board.add_task(" ", Category::Personal).is_err());
        assert!(board.error().is_some());

        board.add_task("Buy milk", Category::Personal).unwrap();
        assert_eq!(board.error(), None);
    }

    #[rstest]
    #[tokio::test]
    async fn set_completed_updates_locally_and_remotely() {
        let api = StubTaskApi::online();
        let store = Arc::new(MemoryStore::new());
        let mut board = board_with(&api, &store);
        board.mount().await;

        let id = board.add_task("Buy milk", Category::Personal).unwrap();
        let before = board.task(&id).unwrap().updated_at;

        assert!(board.set_completed(&id, true));

        let local = board.task(&id).unwrap();
        assert!(local.completed);
        assert!(local.updated_at > before);

        board.settle().await;
        assert!(api.server_tasks().await[0].completed);
        assert!(
            api.calls()
                .contains(&Call::Update(id, TaskPatch::completed(true)))
        );
    }

    #[rstest]
    #[tokio::test]
    async fn unknown_id_is_a_local_no_op() {
        let api = StubTaskApi::online();
        let store = Arc::new(MemoryStore::new());
        let mut board = board_with(&api, &store);
        board.mount().await;
        api.clear_calls();

        let unknown = TaskId::generate();
        assert!(!board.set_completed(&unknown, true));
        assert!(!board.delete_task(&unknown));
        assert_eq!(board.edit_description(&unknown, "Anything"), Ok(false));

        board.settle().await;
        assert!(api.calls().is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn edit_description_validates_and_syncs() {
        let api = StubTaskApi::online();
        let store = Arc::new(MemoryStore::new());
        let mut board = board_with(&api, &store);
        board.mount().await;

        let id = board.add_task("Buy milk", Category::Personal).unwrap();
        assert_eq!(
            board.edit_description(&id, "  "),
            Err(TaskValidationError::EmptyDescription)
        );
        assert_eq!(board.task(&id).unwrap().description, "Buy milk");

        assert_eq!(board.edit_description(&id, "Buy oat milk"), Ok(true));
        board.settle().await;
        assert_eq!(api.server_tasks().await[0].description, "Buy oat milk");
    }

    #[rstest]
    #[tokio::test]
    async fn delete_task_removes_locally_and_remotely() {
        let api = StubTaskApi::online();
        let store = Arc::new(MemoryStore::new());
        let mut board = board_with(&api, &store);
        board.mount().await;

        let id = board.add_task("Buy milk", Category::Personal).unwrap();
        assert!(board.delete_task(&id));

        assert!(board.tasks().is_empty());
        assert!(TaskMirror::new(store).load().is_empty());
        board.settle().await;
        assert!(api.server_tasks().await.is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn remote_failure_does_not_revert_local_change() {
        let api = StubTaskApi::online();
        let store = Arc::new(MemoryStore::new());
        let mut board = board_with(&api, &store);
        board.mount().await;

        let id = board.add_task("Buy milk", Category::Personal).unwrap();
        board.settle().await;

        api.set_online(false);
        board.set_completed(&id, true);
        board.settle().await;

        assert!(board.task(&id).unwrap().completed);
        assert_eq!(board.error(), None);
        assert_eq!(board.pending_sync(), 1);
    }
}

// =============================================================================
// Clear completed
// =============================================================================

#[rstest]
#[tokio::test]
async fn clear_completed_removes_only_completed_tasks_in_category() {
    let api = StubTaskApi::online();
    let store = Arc::new(MemoryStore::new());
    let mut board = board_with(&api, &store);
    board.mount().await;

    let done_personal = board.add_task("Buy milk", Category::Personal).unwrap();
    let open_personal = board.add_task("Call mom", Category::Personal).unwrap();
    let done_professional = board
        .add_task("Write report", Category::Professional)
        .unwrap();
    let also_done_personal = board.add_task("Water plants", Category::Personal).unwrap();
    board.set_completed(&done_personal, true);
    board.set_completed(&done_professional, true);
    board.set_completed(&also_done_personal, true);

    let removed = board.clear_completed(Category::Personal);

    assert_eq!(removed, 2);
    let remaining: Vec<&TaskId> = board.tasks().iter().map(|task| &task.id).collect();
    assert_eq!(remaining, vec![&open_personal, &done_professional]);
    assert_eq!(board.count(Category::Personal), 1);
    assert_eq!(board.completed_count(Category::Professional), 1);

    board.settle().await;
    let server_ids: Vec<TaskId> = api.server_tasks().await.into_iter().map(|task| task.id).collect();
    assert_eq!(server_ids, vec![open_personal, done_professional]);
    assert!(api.calls().contains(&Call::Delete(done_personal)));
    assert!(api.calls().contains(&Call::Delete(also_done_personal)));
}

#[rstest]
#[tokio::test]
async fn clear_completed_with_nothing_to_clear_sends_nothing() {
    let api = StubTaskApi::online();
    let store = Arc::new(MemoryStore::new());
    let mut board = board_with(&api, &store);
    board.mount().await;
    board.add_task("Call mom", Category::Personal).unwrap();
    board.settle().await;
    api.clear_calls();

    assert_eq!(board.clear_completed(Category::Personal), 0);
    board.settle().await;
    assert!(api.calls().is_empty());
}

// =============================================================================
// Outbox replay
// =============================================================================

mod replay {
    use super::*;

    #[rstest]
    #[tokio::test]
    async fn offline_ops_are_replayed_on_flush_with_client_ids() {
        let api = StubTaskApi::offline();
        let store = Arc::new(MemoryStore::new());
        let mut board = board_with(&api, &store);
        board.mount().await;

        let milk = board.add_task("Buy milk", Category::Personal).unwrap();
        let report = board.add_task("Write report", Category::Professional).unwrap();
        board.set_completed(&report, true);
        board.settle().await;
        assert_eq!(board.pending_sync(), 3);
        assert!(api.server_tasks().await.is_empty());

        api.set_online(true);
        let flushed = board.flush().await;

        assert_eq!(flushed.replayed, 3);
        assert_eq!(flushed.pending, 0);
        let server = api.server_tasks().await;
        assert_eq!(server.len(), 2);
        assert_eq!(server[0].id, milk);
        assert_eq!(server[1].id, report);
        assert!(server[1].completed);
    }

    #[rstest]
    #[tokio::test]
    async fn delete_while_create_is_queued_sends_nothing() {
        let api = StubTaskApi::offline();
        let store = Arc::new(MemoryStore::new());
        let mut board = board_with(&api, &store);
        board.mount().await;

        let id = board.add_task("Typo", Category::Personal).unwrap();
        board.delete_task(&id);
        board.settle().await;
        assert_eq!(board.pending_sync(), 0);

        api.set_online(true);
        api.clear_calls();
        board.flush().await;
        assert!(api.calls().is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn reload_overlays_pending_ops_on_server_view() {
        let api = StubTaskApi::online();
        let on_server = stored_task("Buy milk", Category::Personal);
        api.seed(on_server.clone()).await;

        let store = Arc::new(MemoryStore::new());
        let mut board = board_with(&api, &store);
        board.mount().await;

        api.set_writable(false);
        let offline = board.add_task("Call mom", Category::Personal).unwrap();
        board.set_completed(&on_server.id, true);
        board.settle().await;
        assert_eq!(Outbox::load(store.clone()).pending().len(), 2);

        board.reload().await;

        assert_eq!(board.tasks().len(), 2);
        assert!(board.task(&on_server.id).unwrap().completed);
        assert!(board.task(&offline).is_some());
        assert_eq!(board.pending_sync(), 2);
        assert!(!api.server_tasks().await[0].completed);
    }

    #[rstest]
    #[tokio::test]
    async fn outbox_survives_restart() {
        let api = StubTaskApi::offline();
        let store = Arc::new(MemoryStore::new());

        let id = {
            let mut board = board_with(&api, &store);
            board.mount().await;
            let id = board.add_task("Buy milk", Category::Personal).unwrap();
            board.shutdown().await;
            id
        };
        assert!(store.get(OUTBOX_KEY).unwrap().is_some());

        api.set_online(true);
        let mut restarted = board_with(&api, &store);
        restarted.mount().await;

        assert_eq!(restarted.pending_sync(), 0);
        assert_eq!(api.server_tasks().await[0].id, id);
        assert_eq!(restarted.tasks().len(), 1);
        assert_eq!(store.get(OUTBOX_KEY).unwrap(), None);
    }

    #[rstest]
    #[tokio::test]
    async fn replayed_create_that_already_landed_counts_as_applied() {
        let api = StubTaskApi::online();
        let task = stored_task("Buy milk", Category::Personal);
        api.seed(task.clone()).await;

        let store = Arc::new(MemoryStore::new());
        Outbox::load(store.clone()).push(PendingOp::create(task.clone()).into_attempted());
        Outbox::load(store.clone()).push(PendingOp::Delete {
            id: TaskId::generate(),
        });

        let sync = SyncHandle::spawn(Arc::new(api.clone()), store.clone());
        let report = sync.flush().await;

        assert_eq!(report.replayed, 2);
        assert_eq!(report.dropped, 0);
        assert_eq!(report.pending, 0);
        assert_eq!(api.server_tasks().await, vec![task]);
        sync.shutdown().await;
    }

    #[rstest]
    #[tokio::test]
    async fn replayed_update_of_missing_task_is_dropped() {
        let api = StubTaskApi::online();
        let store = Arc::new(MemoryStore::new());
        Outbox::load(store.clone()).push(PendingOp::Update {
            id: TaskId::generate(),
            patch: TaskPatch::completed(true),
        });

        let sync = SyncHandle::spawn(Arc::new(api.clone()), store.clone());
        let report = sync.flush().await;

        assert_eq!(report.replayed, 0);
        assert_eq!(report.dropped, 1);
        assert_eq!(sync.pending_count(), 0);
        sync.shutdown().await;
    }

    #[rstest]
    #[tokio::test]
    async fn ops_queue_behind_pending_ones_in_order() {
        let api = StubTaskApi::offline();
        let store = Arc::new(MemoryStore::new());
        let mut board = board_with(&api, &store);

        let first = board.add_task("First", Category::Personal).unwrap();
        board.settle().await;
        api.set_online(true);

        let second = board.add_task("Second", Category::Personal).unwrap();
        board.settle().await;

        // The second create waited behind the first one.
        assert_eq!(board.pending_sync(), 2);
        assert!(api.server_tasks().await.is_empty());

        board.flush().await;
        let ids: Vec<TaskId> = api.server_tasks().await.into_iter().map(|task| task.id).collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[rstest]
    #[tokio::test]
    async fn create_with_lost_response_is_confirmed_on_replay() {
        let api = StubTaskApi::online();
        let store = Arc::new(MemoryStore::new());
        let mut board = board_with(&api, &store);
        board.mount().await;

        api.set_lose_responses(true);
        let id = board.add_task("Buy milk", Category::Personal).unwrap();
        board.settle().await;
        assert_eq!(board.pending_sync(), 1);
        assert_eq!(api.server_tasks().await.len(), 1);

        api.set_lose_responses(false);
        let report = board.flush().await;

        assert_eq!(report.replayed, 1);
        assert_eq!(report.pending, 0);
        let server = api.server_tasks().await;
        assert_eq!(server.len(), 1);
        assert_eq!(server[0].id, id);
    }

    #[rstest]
    #[tokio::test]
    async fn edit_after_create_with_lost_response_reaches_server() {
        let api = StubTaskApi::online();
        let store = Arc::new(MemoryStore::new());
        let mut board = board_with(&api, &store);
        board.mount().await;

        api.set_lose_responses(true);
        let id = board.add_task("Buy mlik", Category::Personal).unwrap();
        board.settle().await;
        assert_eq!(board.edit_description(&id, "Buy milk"), Ok(true));
        board.settle().await;
        assert_eq!(board.pending_sync(), 2);

        api.set_lose_responses(false);
        board.reload().await;

        assert_eq!(board.pending_sync(), 0);
        assert_eq!(api.server_tasks().await[0].description, "Buy milk");
        assert_eq!(board.task(&id).unwrap().description, "Buy milk");
    }

    #[rstest]
    #[tokio::test]
    async fn delete_after_create_with_lost_response_removes_server_task() {
        let api = StubTaskApi::online();
        let store = Arc::new(MemoryStore::new());
        let mut board = board_with(&api, &store);
        board.mount().await;

        api.set_lose_responses(true);
        let id = board.add_task("Buy milk", Category::Personal).unwrap();
        board.settle().await;
        assert!(board.delete_task(&id));
        board.settle().await;
        assert_eq!(
            Outbox::load(store.clone()).pending(),
            vec![PendingOp::Delete { id: id.clone() }]
        );

        api.set_lose_responses(false);
        board.reload().await;

        assert!(api.server_tasks().await.is_empty());
        assert!(board.tasks().is_empty());
        assert_eq!(board.pending_sync(), 0);
    }
}
