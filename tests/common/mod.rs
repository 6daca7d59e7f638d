//! Common test helpers for integration tests.
//!
//! # Note
//!
//! The `#![allow(dead_code)]` attribute is necessary because each
//! integration test file compiles as its own crate and uses a different
//! subset of these helpers.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::net::TcpListener;

use todo_sync::api::{AppState, create_router};
use todo_sync::client::{NewTask, RemoteError, TaskApi};
use todo_sync::domain::{Task, TaskId, TaskPatch, Timestamp};
use todo_sync::infrastructure::{InMemoryTaskRepository, RepositoryError, TaskRepository};

// =============================================================================
// Stub remote
// =============================================================================

/// One call received by [`StubTaskApi`], recorded even when offline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Create(TaskId),
    Update(TaskId, TaskPatch),
    Delete(TaskId),
}

/// In-process [`TaskApi`] over an in-memory repository, with an
/// online/offline switch, a switch that rejects writes and one that
/// applies writes but loses the response.
#[derive(Clone)]
pub struct StubTaskApi {
    repository: InMemoryTaskRepository,
    online: Arc<AtomicBool>,
    writable: Arc<AtomicBool>,
    lose_responses: Arc<AtomicBool>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl StubTaskApi {
    pub fn online() -> Self {
        Self {
            repository: InMemoryTaskRepository::new(),
            online: Arc::new(AtomicBool::new(true)),
            writable: Arc::new(AtomicBool::new(true)),
            lose_responses: Arc::new(AtomicBool::new(false)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn offline() -> Self {
        let api = Self::online();
        api.set_online(false);
        api
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// While `false`, every call except listing fails with a 503.
    pub fn set_writable(&self, writable: bool) {
        self.writable.store(writable, Ordering::SeqCst);
    }

    /// While `true`, writes reach the repository and then report a timeout,
    /// as if the connection dropped before the response arrived.
    pub fn set_lose_responses(&self, lose: bool) {
        self.lose_responses.store(lose, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Tasks currently held by the fake server.
    pub async fn server_tasks(&self) -> Vec<Task> {
        self.repository.list().await.unwrap()
    }

    /// Puts a task on the fake server directly.
    pub async fn seed(&self, task: Task) {
        self.repository.insert(&task).await.unwrap();
    }

    fn record(&self, call: Call) -> Result<(), RemoteError> {
        let is_write = call != Call::List;
        self.calls.lock().push(call);

        if !self.online.load(Ordering::SeqCst) {
            return Err(RemoteError::ConnectionFailed(
                "connection refused".to_string(),
            ));
        }
        if is_write && !self.writable.load(Ordering::SeqCst) {
            return Err(RemoteError::Status {
                status: 503,
                message: "Service Unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn lost_response(&self) -> Result<(), RemoteError> {
        if self.lose_responses.load(Ordering::SeqCst) {
            Err(RemoteError::Timeout(10_000))
        } else {
            Ok(())
        }
    }
}

fn to_remote(error: RepositoryError) -> RemoteError {
    let (status, message) = match error {
        RepositoryError::NotFound(_) => (404, "Task not found".to_string()),
        RepositoryError::AlreadyExists(id) => (409, format!("Task {id} already exists")),
        RepositoryError::StorageError(message) => (500, message),
    };
    RemoteError::Status { status, message }
}

impl TaskApi for StubTaskApi {
    fn list_tasks(&self) -> BoxFuture<'static, Result<Vec<Task>, RemoteError>> {
        let gate = self.record(Call::List);
        let repository = self.repository.clone();
        async move {
            gate?;
            repository.list().await.map_err(to_remote)
        }
        .boxed()
    }

    fn create_task(&self, task: NewTask) -> BoxFuture<'static, Result<Task, RemoteError>> {
        let id = task.id.clone().unwrap_or_else(TaskId::generate);
        let gate = self.record(Call::Create(id.clone()));
        let lost = self.lost_response();
        let repository = self.repository.clone();
        async move {
            gate?;
            let created = Task::new(id, task.description, task.category, Timestamp::now());
            let created = repository.insert(&created).await.map_err(to_remote)?;
            lost.map(|()| created)
        }
        .boxed()
    }

    fn update_task(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> BoxFuture<'static, Result<Task, RemoteError>> {
        let gate = self.record(Call::Update(id.clone(), patch.clone()));
        let lost = self.lost_response();
        let repository = self.repository.clone();
        let id = id.clone();
        let patch = patch.clone();
        async move {
            gate?;
            let updated = repository.update(&id, &patch).await.map_err(to_remote)?;
            lost.map(|()| updated)
        }
        .boxed()
    }

    fn delete_task(&self, id: &TaskId) -> BoxFuture<'static, Result<(), RemoteError>> {
        let gate = self.record(Call::Delete(id.clone()));
        let lost = self.lost_response();
        let repository = self.repository.clone();
        let id = id.clone();
        async move {
            gate?;
            repository.delete(&id).await.map_err(to_remote)?;
            lost
        }
        .boxed()
    }
}

// =============================================================================
// Live server
// =============================================================================

/// Serves a fresh router on an ephemeral local port and returns the API
/// base URL (`http://127.0.0.1:<port>/api`).
pub async fn spawn_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let router = create_router(AppState::in_memory());

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://{address}/api")
}
