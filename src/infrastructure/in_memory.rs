//! In-memory repository implementation.
//!
//! Tasks live in a `Vec` behind `Arc<RwLock<...>>`; every mutation runs
//! under a single write lock. Nothing survives a restart.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::domain::{Task, TaskId, TaskPatch};
use crate::infrastructure::{RepositoryError, TaskRepository};

/// In-memory implementation of `TaskRepository`.
///
/// Cloning shares the underlying collection.
///
/// # Example
///
/// ```ignore
/// let repository = InMemoryTaskRepository::new();
/// let task = Task::new(TaskId::generate(), "Buy milk", Category::Personal, Timestamp::now());
///
/// repository.insert(&task).await?;
/// let found = repository.find_by_id(&task.id).await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskRepository {
    tasks: Arc<RwLock<Vec<Task>>>,
}

impl InMemoryTaskRepository {
    /// Creates a new empty in-memory task repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[allow(clippy::significant_drop_tightening)]
impl TaskRepository for InMemoryTaskRepository {
    fn list(&self) -> BoxFuture<'static, Result<Vec<Task>, RepositoryError>> {
        let tasks = Arc::clone(&self.tasks);
        async move { Ok(tasks.read().await.clone()) }.boxed()
    }

    fn find_by_id(&self, id: &TaskId) -> BoxFuture<'static, Result<Option<Task>, RepositoryError>> {
        let tasks = Arc::clone(&self.tasks);
        let id = id.clone();
        async move {
            let guard = tasks.read().await;
            Ok(guard.iter().find(|task| task.id == id).cloned())
        }
        .boxed()
    }

    fn insert(&self, task: &Task) -> BoxFuture<'static, Result<Task, RepositoryError>> {
        let tasks = Arc::clone(&self.tasks);
        let task = task.clone();
        async move {
            let mut guard = tasks.write().await;
            if guard.iter().any(|existing| existing.id == task.id) {
                return Err(RepositoryError::AlreadyExists(task.id.to_string()));
            }
            guard.push(task.clone());
            Ok(task)
        }
        .boxed()
    }

    fn update(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> BoxFuture<'static, Result<Task, RepositoryError>> {
        let tasks = Arc::clone(&self.tasks);
        let id = id.clone();
        let patch = patch.clone();
        async move {
            let mut guard = tasks.write().await;
            let slot = guard
                .iter_mut()
                .find(|task| task.id == id)
                .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

            let stamp = slot.next_update_stamp();
            let updated = slot.clone().apply(&patch, stamp);
            *slot = updated.clone();
            Ok(updated)
        }
        .boxed()
    }

    fn delete(&self, id: &TaskId) -> BoxFuture<'static, Result<(), RepositoryError>> {
        let tasks = Arc::clone(&self.tasks);
        let id = id.clone();
        async move {
            let mut guard = tasks.write().await;
            let index = guard
                .iter()
                .position(|task| task.id == id)
                .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
            guard.remove(index);
            Ok(())
        }
        .boxed()
    }

    fn clear(&self) -> BoxFuture<'static, Result<(), RepositoryError>> {
        let tasks = Arc::clone(&self.tasks);
        async move {
            tasks.write().await.clear();
            Ok(())
        }
        .boxed()
    }
}

// =============================================================================
// Tests
// =============================================================================
