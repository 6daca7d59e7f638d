//! HTTP handlers for the task API.
//!
//! Every handler validates its input first, then talks to the repository
//! held in [`AppState`]. Repository and validation failures are converted
//! into [`ApiErrorResponse`] with `?`.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};

use super::dto::{
    ApiResponse, CreateTaskRequest, HealthResponse, TaskResponse, UpdateTaskRequest,
    ValidatedCreateTask, parse_task_id, validate_create_request, validate_update_request,
};
use super::error::ApiErrorResponse;
use crate::domain::{Task, TaskId, Timestamp};
use crate::infrastructure::{InMemoryTaskRepository, RepositoryError, TaskRepository};

// =============================================================================
// Application State
// =============================================================================

/// Shared application dependencies.
///
/// The repository is application scoped: each `AppState` owns its own
/// collection, so tests and multiple routers never share data by accident.
#[derive(Clone)]
pub struct AppState {
    /// Task repository for persistence.
    pub task_repository: Arc<dyn TaskRepository>,
}

impl AppState {
    /// Creates an `AppState` around an existing repository.
    #[must_use]
    pub fn new(task_repository: Arc<dyn TaskRepository>) -> Self {
        Self { task_repository }
    }

    /// Creates an `AppState` backed by a fresh in-memory repository.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryTaskRepository::new()))
    }
}

type TaskResult = Result<Json<ApiResponse<TaskResponse>>, ApiErrorResponse>;

// =============================================================================
// GET /api/tasks
// =============================================================================

/// Lists every task in insertion order.
///
/// # Errors
///
/// Returns 500 when the repository fails.
pub async fn list_tasks(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<TaskResponse>>>, ApiErrorResponse> {
    let tasks = state
        .task_repository
        .list()
        .await
        .map_err(|error| internal("Failed to retrieve tasks", &error))?;

    Ok(Json(ApiResponse::ok(
        tasks.iter().map(TaskResponse::from).collect(),
    )))
}

// =============================================================================
// GET /api/tasks/{id}
// =============================================================================

/// Returns a single task.
///
/// # Errors
///
/// - 400 when the id is not a UUID v4
/// - 404 when no task has that id
pub async fn get_task(State(state): State<AppState>, Path(id): Path<String>) -> TaskResult {
    let id = parse_task_id(&id)?;

    let task = state
        .task_repository
        .find_by_id(&id)
        .await
        .map_err(|error| internal("Failed to retrieve task", &error))?
        .ok_or_else(|| ApiErrorResponse::not_found("Task not found"))?;

    Ok(Json(ApiResponse::ok(TaskResponse::from(&task))))
}

// =============================================================================
// POST /api/tasks
// =============================================================================

/// Creates a new task.
///
/// # Request Body
///
/// ```json
/// {
///   "id": "optional client-generated UUID v4",
///   "description": "Buy milk",
///   "category": "Personal"
/// }
/// ```
///
/// # Response
///
/// - **201 Created**: Task created successfully
/// - **400 Bad Request**: Validation error or malformed JSON
/// - **409 Conflict**: The client-supplied id is already taken
/// - **500 Internal Server Error**: Repository failure
///
/// # Errors
///
/// See the response codes above.
pub async fn create_task(
    State(state): State<AppState>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<TaskResponse>>), ApiErrorResponse> {
    let Json(request) = payload?;
    let validated = validate_create_request(&request)?;
    let task = build_task(validated);

    let saved = state
        .task_repository
        .insert(&task)
        .await
        .map_err(|error| match error {
            RepositoryError::AlreadyExists(_) => ApiErrorResponse::from(error),
            other => internal("Failed to create task", &other),
        })?;

    tracing::info!(task_id = %saved.id, category = %saved.category, "Task created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(TaskResponse::from(&saved))),
    ))
}

/// Builds a task from validated data, minting an id if the client sent none.
fn build_task(validated: ValidatedCreateTask) -> Task {
    let id = validated.id.unwrap_or_else(TaskId::generate);
    Task::new(
        id,
        validated.description,
        validated.category,
        Timestamp::now(),
    )
}

// =============================================================================
// PUT /api/tasks/{id}
// =============================================================================

/// Updates the description and/or completion flag of a task.
///
/// # Errors
///
/// - 400 when the id or the body is invalid
/// - 404 when no task has that id
/// - 500 when the repository fails
pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> TaskResult {
    let id = parse_task_id(&id)?;
    let Json(request) = payload?;
    let patch = validate_update_request(&request)?;

    let updated = state
        .task_repository
        .update(&id, &patch)
        .await
        .map_err(|error| match error {
            RepositoryError::NotFound(_) => ApiErrorResponse::from(error),
            other => internal("Failed to update task", &other),
        })?;

    tracing::info!(task_id = %updated.id, completed = updated.completed, "Task updated");

    Ok(Json(ApiResponse::ok(TaskResponse::from(&updated))))
}

// =============================================================================
// DELETE /api/tasks/{id}
// =============================================================================

/// Deletes a task. Responds 204 with an empty body.
///
/// # Errors
///
/// - 400 when the id is invalid
/// - 404 when no task has that id (including one deleted earlier)
/// - 500 when the repository fails
pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiErrorResponse> {
    let id = parse_task_id(&id)?;

    state
        .task_repository
        .delete(&id)
        .await
        .map_err(|error| match error {
            RepositoryError::NotFound(_) => ApiErrorResponse::from(error),
            other => internal("Failed to delete task", &other),
        })?;

    tracing::info!(task_id = %id, "Task deleted");

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// GET /health
// =============================================================================

/// Health check endpoint.
///
/// ```json
/// { "status": "OK", "timeStamp": "2025-01-31T09:15:00.123Z" }
/// ```
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        time_stamp: Timestamp::now().to_string(),
    })
}

// =============================================================================
// Fallback
// =============================================================================

/// Answers every request no route matches.
pub async fn route_not_found() -> ApiErrorResponse {
    ApiErrorResponse::route_not_found()
}

fn internal(message: &'static str, error: &RepositoryError) -> ApiErrorResponse {
    tracing::error!(%error, "{message}");
    ApiErrorResponse::internal_error(message)
}

// =============================================================================
// Tests
// =============================================================================
