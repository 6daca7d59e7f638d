//! Client for the remote task service.
//!
//! Four thin request wrappers over `{base}/tasks`. Success bodies are
//! unwrapped from the `{success, data}` envelope and failures become a
//! [`RemoteError`]. Nothing here retries; that is the sync worker's job.

use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::ApiResponse;
use crate::domain::{Category, Task, TaskId, TaskPatch};

// =============================================================================
// Errors
// =============================================================================

/// Failures of a remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The service could not be reached.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The request did not complete within the timeout.
    #[error("Timeout after {0}ms")]
    Timeout(u64),

    /// The service answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    /// Returns `true` if the service was never reached or never answered.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_) | Self::Timeout(_))
    }

    /// Returns `true` if sending the same request later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionFailed(_) | Self::Timeout(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::InvalidResponse(_) => false,
        }
    }

    /// Returns the HTTP status, if the service answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Body of a create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    /// Id minted by the client. Omitted to let the server choose.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TaskId>,
    pub description: String,
    pub category: Category,
}

impl From<&Task> for NewTask {
    fn from(task: &Task) -> Self {
        Self {
            id: Some(task.id.clone()),
            description: task.description.clone(),
            category: task.category,
        }
    }
}

// =============================================================================
// TaskApi
// =============================================================================

/// The remote task service as seen by the client.
pub trait TaskApi: Send + Sync {
    /// `GET {base}/tasks`
    fn list_tasks(&self) -> BoxFuture<'static, Result<Vec<Task>, RemoteError>>;

    /// `POST {base}/tasks`
    fn create_task(&self, task: NewTask) -> BoxFuture<'static, Result<Task, RemoteError>>;

    /// `PUT {base}/tasks/{id}`
    fn update_task(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> BoxFuture<'static, Result<Task, RemoteError>>;

    /// `DELETE {base}/tasks/{id}`
    fn delete_task(&self, id: &TaskId) -> BoxFuture<'static, Result<(), RemoteError>>;
}

/// [`TaskApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTaskApi {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTaskApi {
    /// Creates a client for `base_url` (for example `http://localhost:5000/api`).
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// Returns the base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn tasks_url(&self) -> String {
        format!("{}/tasks", self.base_url)
    }

    fn task_url(&self, id: &TaskId) -> String {
        format!("{}/tasks/{id}", self.base_url)
    }
}

impl TaskApi for HttpTaskApi {
    fn list_tasks(&self) -> BoxFuture<'static, Result<Vec<Task>, RemoteError>> {
        let request = self.client.get(self.tasks_url()).timeout(self.timeout);
        let timeout = self.timeout;

        async move {
            let response = request.send().await.map_err(|error| transport(&error, timeout))?;
            read_envelope(response).await
        }
        .boxed()
    }

    fn create_task(&self, task: NewTask) -> BoxFuture<'static, Result<Task, RemoteError>> {
        let request = self
            .client
            .post(self.tasks_url())
            .timeout(self.timeout)
            .json(&task);
        let timeout = self.timeout;

        async move {
            let response = request.send().await.map_err(|error| transport(&error, timeout))?;
            read_envelope(response).await
        }
        .boxed()
    }

    fn update_task(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> BoxFuture<'static, Result<Task, RemoteError>> {
        let request = self
            .client
            .put(self.task_url(id))
            .timeout(self.timeout)
            .json(patch);
        let timeout = self.timeout;

        async move {
            let response = request.send().await.map_err(|error| transport(&error, timeout))?;
            read_envelope(response).await
        }
        .boxed()
    }

    fn delete_task(&self, id: &TaskId) -> BoxFuture<'static, Result<(), RemoteError>> {
        let request = self.client.delete(self.task_url(id)).timeout(self.timeout);
        let timeout = self.timeout;

        async move {
            let response = request.send().await.map_err(|error| transport(&error, timeout))?;
            if response.status().is_success() {
                Ok(())
            } else {
                Err(status_error(response).await)
            }
        }
        .boxed()
    }
}

fn transport(error: &reqwest::Error, timeout: Duration) -> RemoteError {
    if error.is_timeout() {
        RemoteError::Timeout(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))
    } else {
        RemoteError::ConnectionFailed(error.to_string())
    }
}

async fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    if !response.status().is_success() {
        return Err(status_error(response).await);
    }

    response
        .json::<ApiResponse<T>>()
        .await
        .map(|envelope| envelope.data)
        .map_err(|error| RemoteError::InvalidResponse(error.to_string()))
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

async fn status_error(response: Response) -> RemoteError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    RemoteError::Status {
        status: status.as_u16(),
        message: error_message(status, &body),
    }
}

/// Picks `error`, then `message` from a JSON error body, falling back to
/// the canonical reason phrase.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.error.or(parsed.message))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        })
}

// =============================================================================
// Tests
// =============================================================================
