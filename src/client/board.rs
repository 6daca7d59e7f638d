//! The client's working copy of the task list.
//!
//! [`TaskBoard`] is optimistic: every mutation updates the local collection
//! and the mirror first, then hands the matching remote op to the sync
//! worker. Remote failures never block or revert a local change.

use std::sync::Arc;

use tokio::sync::watch;

use super::outbox::{PendingOp, overlay_pending};
use super::remote::TaskApi;
use super::storage::{KeyValueStore, TaskMirror};
use super::worker::{FlushReport, SyncHandle};
use crate::domain::{
    Category, Task, TaskId, TaskPatch, TaskValidationError, Timestamp, validate_description,
};

/// Local task collection kept in sync with the remote service.
///
/// # Examples
///
/// ```rust,ignore
/// let mut board = TaskBoard::new(api, store);
/// board.mount().await;
/// let id = board.add_task("Buy milk", Category::Personal)?;
/// board.set_completed(&id, true);
/// board.settle().await;
/// ```
pub struct TaskBoard {
    tasks: Vec<Task>,
    loading: watch::Sender<bool>,
    error: Option<String>,
    mounted: bool,
    mirror: TaskMirror,
    api: Arc<dyn TaskApi>,
    sync: SyncHandle,
}

impl TaskBoard {
    /// Creates a board from the mirrored collection in `store` and starts
    /// its sync worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(api: Arc<dyn TaskApi>, store: Arc<dyn KeyValueStore>) -> Self {
        let mirror = TaskMirror::new(Arc::clone(&store));
        let tasks = mirror.load();
        let sync = SyncHandle::spawn(Arc::clone(&api), store);

        Self {
            tasks,
            loading: watch::Sender::new(false),
            error: None,
            mounted: false,
            mirror,
            api,
            sync,
        }
    }

    // -------------------------------------------------------------------------
    // Loading
    // -------------------------------------------------------------------------

    /// Loads from the server once per board. Later calls do nothing.
    pub async fn mount(&mut self) {
        if self.mounted {
            return;
        }
        self.mounted = true;
        self.reload().await;
    }

    /// Replays the outbox, then replaces the collection with the server's
    /// view plus any ops still pending.
    ///
    /// When the server is unreachable the current collection is kept and
    /// no error is surfaced.
    pub async fn reload(&mut self) {
        self.loading.send_replace(true);
        self.sync.flush().await;

        match self.api.list_tasks().await {
            Ok(server_tasks) => {
                self.tasks = overlay_pending(server_tasks, &self.sync.pending_ops());
                self.persist();
                tracing::debug!(count = self.tasks.len(), "Loaded tasks from server");
            }
            Err(error) => {
                tracing::warn!(%error, "Failed to load tasks from server, using local copy");
            }
        }

        self.loading.send_replace(false);
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Adds a task and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`TaskValidationError::EmptyDescription`] when the trimmed
    /// description is empty. The board's `error` is set and nothing else
    /// changes.
    pub fn add_task(
        &mut self,
        description: &str,
        category: Category,
    ) -> Result<TaskId, TaskValidationError> {
        self.check_description(description)?;

        let task = Task::new(TaskId::generate(), description, category, Timestamp::now());
        let id = task.id.clone();
        self.tasks.push(task.clone());
        self.committed();
        self.sync.dispatch(PendingOp::create(task));

        Ok(id)
    }

    /// Sets the completion flag of a task. Returns `false` for an unknown id.
    pub fn set_completed(&mut self, id: &TaskId, completed: bool) -> bool {
        self.patch(id, TaskPatch::completed(completed))
    }

    /// Replaces the description of a task. Returns `Ok(false)` for an
    /// unknown id.
    ///
    /// # Errors
    ///
    /// Same validation as [`TaskBoard::add_task`].
    pub fn edit_description(
        &mut self,
        id: &TaskId,
        description: &str,
    ) -> Result<bool, TaskValidationError> {
        self.check_description(description)?;
        Ok(self.patch(id, TaskPatch::description(description)))
    }

    /// Removes a task. Returns `false` for an unknown id.
    pub fn delete_task(&mut self, id: &TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != *id);
        if self.tasks.len() == before {
            return false;
        }

        self.committed();
        self.sync.dispatch(PendingOp::Delete { id: id.clone() });
        true
    }

    /// Removes every completed task in `category` and returns how many
    /// were removed. Each removal is sent as its own delete.
    pub fn clear_completed(&mut self, category: Category) -> usize {
        let (cleared, kept): (Vec<Task>, Vec<Task>) = std::mem::take(&mut self.tasks)
            .into_iter()
            .partition(|task| task.is_completed_in(category));
        self.tasks = kept;

        if cleared.is_empty() {
            return 0;
        }

        self.committed();
        for task in &cleared {
            self.sync.dispatch(PendingOp::Delete {
                id: task.id.clone(),
            });
        }
        tracing::info!(%category, count = cleared.len(), "Cleared completed tasks");
        cleared.len()
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Every task, in insertion order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Tasks in `category`, in insertion order.
    pub fn tasks_in(&self, category: Category) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |task| task.belongs_to(category))
    }

    /// Looks up one task by id.
    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == *id)
    }

    /// Number of tasks in `category`.
    pub fn count(&self, category: Category) -> usize {
        self.tasks_in(category).count()
    }

    /// Number of completed tasks in `category`.
    pub fn completed_count(&self, category: Category) -> usize {
        self.tasks_in(category).filter(|task| task.completed).count()
    }

    /// Whether a [`TaskBoard::reload`] is in progress.
    ///
    /// Reload borrows the board mutably, so other tasks observe the flag
    /// through [`TaskBoard::subscribe_loading`].
    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    /// Receiver that follows the loading flag while the board is busy.
    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    /// The last validation error, cleared by the next successful mutation.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Number of ops waiting for the server.
    pub fn pending_sync(&self) -> usize {
        self.sync.pending_count()
    }

    // -------------------------------------------------------------------------
    // Sync control
    // -------------------------------------------------------------------------

    /// Replays the outbox now.
    pub async fn flush(&self) -> FlushReport {
        self.sync.flush().await
    }

    /// Waits until every op dispatched so far has been handled.
    pub async fn settle(&self) {
        self.sync.settle().await;
    }

    /// Handles every dispatched op and stops the sync worker.
    pub async fn shutdown(self) {
        self.sync.shutdown().await;
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn check_description(&mut self, description: &str) -> Result<(), TaskValidationError> {
        validate_description(description).inspect_err(|error| {
            self.error = Some(error.to_string());
        })
    }

    fn patch(&mut self, id: &TaskId, patch: TaskPatch) -> bool {
        let Some(index) = self.tasks.iter().position(|task| task.id == *id) else {
            return false;
        };

        let task = self.tasks.remove(index);
        let stamp = task.next_update_stamp();
        self.tasks.insert(index, task.apply(&patch, stamp));

        self.committed();
        self.sync.dispatch(PendingOp::Update {
            id: id.clone(),
            patch,
        });
        true
    }

    /// Bookkeeping after a successful local mutation.
    fn committed(&mut self) {
        self.error = None;
        self.persist();
    }

    fn persist(&self) {
        if let Err(error) = self.mirror.save(&self.tasks) {
            tracing::warn!(%error, "Failed to persist task mirror");
        }
    }
}
