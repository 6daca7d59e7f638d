//! Repository trait for the task collection.
//!
//! Methods return boxed futures so the trait stays object safe and can be
//! shared as `Arc<dyn TaskRepository>` inside the application state.

use futures::future::BoxFuture;
use thiserror::Error;

use crate::domain::{Task, TaskId, TaskPatch};

// =============================================================================
// Repository Error
// =============================================================================

/// Errors that can occur during repository operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// No task with the given id.
    #[error("Task not found: {0}")]
    NotFound(String),

    /// A task with the given id already exists.
    #[error("Task already exists: {0}")]
    AlreadyExists(String),

    /// The backing store failed.
    #[error("Storage error: {0}")]
    StorageError(String),
}

// =============================================================================
// Task Repository
// =============================================================================

/// Storage for the server-side task collection.
///
/// Implementations keep insertion order: `list` returns tasks in the order
/// they were inserted.
pub trait TaskRepository: Send + Sync {
    /// Returns every task.
    fn list(&self) -> BoxFuture<'static, Result<Vec<Task>, RepositoryError>>;

    /// Finds a task by its ID.
    ///
    /// Returns `Ok(Some(task))` if found, `Ok(None)` if not found,
    /// or an error if the operation fails.
    fn find_by_id(&self, id: &TaskId) -> BoxFuture<'static, Result<Option<Task>, RepositoryError>>;

    /// Inserts a new task and returns it.
    ///
    /// Fails with [`RepositoryError::AlreadyExists`] if the id is taken.
    fn insert(&self, task: &Task) -> BoxFuture<'static, Result<Task, RepositoryError>>;

    /// Applies a patch to an existing task and returns the updated task.
    ///
    /// `updated_at` is advanced past its previous value. Fails with
    /// [`RepositoryError::NotFound`] if the id is absent.
    fn update(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> BoxFuture<'static, Result<Task, RepositoryError>>;

    /// Removes a task.
    ///
    /// Fails with [`RepositoryError::NotFound`] if the id is absent.
    fn delete(&self, id: &TaskId) -> BoxFuture<'static, Result<(), RepositoryError>>;

    /// Removes every task.
    fn clear(&self) -> BoxFuture<'static, Result<(), RepositoryError>>;
}
