//! Persisted queue of remote operations that have not reached the server.
//!
//! Ops for the same task are compacted on push so that the queue never
//! holds work the server would reject or undo:
//!
//! - a description-only update folds into a queued create of that task,
//! - updates of one task merge into a single queued update,
//! - a delete of a task whose create is still queued cancels every op for
//!   that task, otherwise it replaces the queued ops with a single delete.
//!
//! Folding and cancelling only touch creates that were never sent. A create
//! that failed in flight may already exist on the server, so ops behind it
//! stay regular updates and deletes.
//!
//! Writes to the store are synchronous and happen under the caller's lock.
//! The queue is small and its store is local, so the sync worker does them
//! inline instead of moving them to a blocking thread.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::storage::KeyValueStore;
use crate::domain::{Task, TaskId, TaskPatch};

/// Key under which the outbox is stored.
pub const OUTBOX_KEY: &str = "outbox";

/// A remote operation waiting to be sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum PendingOp {
    Create {
        task: Task,
        /// Set once a send was tried. The server may hold the task.
        #[serde(default)]
        attempted: bool,
    },
    Update { id: TaskId, patch: TaskPatch },
    Delete { id: TaskId },
}

impl PendingOp {
    /// A create that has not been sent yet.
    #[must_use]
    pub const fn create(task: Task) -> Self {
        Self::Create {
            task,
            attempted: false,
        }
    }

    /// Marks a create as sent at least once. Other ops are unchanged.
    #[must_use]
    pub fn into_attempted(self) -> Self {
        match self {
            Self::Create { task, .. } => Self::Create {
                task,
                attempted: true,
            },
            other => other,
        }
    }

    /// The task this op targets.
    #[must_use]
    pub const fn task_id(&self) -> &TaskId {
        match self {
            Self::Create { task, .. } => &task.id,
            Self::Update { id, .. } | Self::Delete { id } => id,
        }
    }
}

/// FIFO of [`PendingOp`] backed by a [`KeyValueStore`].
pub struct Outbox {
    ops: VecDeque<PendingOp>,
    store: Arc<dyn KeyValueStore>,
}

impl Outbox {
    /// Loads the queue from `store`. Absent or unparsable data yields an
    /// empty queue.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let ops = match store.get(OUTBOX_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|error| {
                tracing::warn!(%error, "Discarding unparsable outbox");
                VecDeque::new()
            }),
            Ok(None) => VecDeque::new(),
            Err(error) => {
                tracing::warn!(%error, "Failed to read outbox");
                VecDeque::new()
            }
        };

        Self { ops, store }
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn front(&self) -> Option<&PendingOp> {
        self.ops.front()
    }

    /// Removes the head of the queue and persists.
    pub fn pop_front(&mut self) -> Option<PendingOp> {
        let op = self.ops.pop_front();
        self.persist();
        op
    }

    /// Marks the head of the queue as sent at least once and persists.
    pub fn mark_front_attempted(&mut self) {
        if let Some(front) = self.ops.pop_front() {
            self.ops.push_front(front.into_attempted());
            self.persist();
        }
    }

    /// Snapshot of the queued ops, head first.
    pub fn pending(&self) -> Vec<PendingOp> {
        self.ops.iter().cloned().collect()
    }

    /// Queues `op`, compacting it against ops already queued for the same
    /// task, and persists.
    pub fn push(&mut self, op: PendingOp) {
        match op {
            PendingOp::Create { .. } => self.ops.push_back(op),
            PendingOp::Update { id, patch } => self.push_update(id, patch),
            PendingOp::Delete { id } => self.push_delete(id),
        }
        self.persist();
    }

    fn push_update(&mut self, id: TaskId, mut patch: TaskPatch) {
        if let Some(description) = patch.description.take() {
            if let Some(task) = self.unsent_create_mut(&id) {
                task.description = description;
            } else {
                patch.description = Some(description);
            }
        }

        if patch.is_empty() {
            return;
        }

        let queued = self.ops.iter_mut().find_map(|op| match op {
            PendingOp::Update {
                id: queued_id,
                patch: queued_patch,
            } if *queued_id == id => Some(queued_patch),
            _ => None,
        });

        match queued {
            Some(queued_patch) => *queued_patch = std::mem::take(queued_patch).merge(patch),
            None => self.ops.push_back(PendingOp::Update { id, patch }),
        }
    }

    fn push_delete(&mut self, id: TaskId) {
        let never_sent = self.ops.iter().any(|op| {
            matches!(op, PendingOp::Create { task, attempted: false } if task.id == id)
        });

        self.ops.retain(|op| op.task_id() != &id);

        if !never_sent {
            self.ops.push_back(PendingOp::Delete { id });
        }
    }

    fn unsent_create_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.ops.iter_mut().find_map(|op| match op {
            PendingOp::Create {
                task,
                attempted: false,
            } if task.id == *id => Some(task),
            _ => None,
        })
    }

    fn persist(&self) {
        let result = if self.ops.is_empty() {
            self.store.remove(OUTBOX_KEY)
        } else {
            match serde_json::to_string(&self.ops) {
                Ok(json) => self.store.set(OUTBOX_KEY, &json),
                Err(error) => {
                    tracing::error!(%error, "Failed to encode outbox");
                    return;
                }
            }
        };

        if let Err(error) = result {
            tracing::warn!(%error, "Failed to persist outbox");
        }
    }
}

/// Applies queued ops on top of a collection fetched from the server, so
/// that local changes the server has not seen yet stay visible.
pub fn overlay_pending(mut tasks: Vec<Task>, pending: &[PendingOp]) -> Vec<Task> {
    for op in pending {
        match op {
            PendingOp::Create { task, .. } => {
                if !tasks.iter().any(|existing| existing.id == task.id) {
                    tasks.push(task.clone());
                }
            }
            PendingOp::Update { id, patch } => {
                if let Some(index) = tasks.iter().position(|task| task.id == *id) {
                    let task = tasks.remove(index);
                    let stamp = task.next_update_stamp();
                    tasks.insert(index, task.apply(patch, stamp));
                }
            }
            PendingOp::Delete { id } => tasks.retain(|task| task.id != *id),
        }
    }
    tasks
}

// =============================================================================
// Tests
// =============================================================================
