//! Data Transfer Objects for API requests and responses.
//!
//! Request bodies are deserialized loosely (`serde_json::Value` per field)
//! and then validated field by field, so that a wrong JSON type produces a
//! 400 with a message naming the field rather than a generic rejection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{ApiErrorResponse, ValidationError};
use crate::domain::{Category, Task, TaskId, TaskPatch, validate_description};

// =============================================================================
// Envelope
// =============================================================================

/// Success envelope: `{"success": true, "data": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Always `true` for successful responses.
    pub success: bool,
    /// The payload.
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// Wraps a payload in a success envelope.
    #[must_use]
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

// =============================================================================
// Task DTOs
// =============================================================================

/// Request DTO for creating a new task.
///
/// `id` is optional: clients that mint their own UUID v4 send it so that
/// both sides agree on the identifier.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTaskRequest {
    /// Client-generated id.
    #[serde(default)]
    pub id: Option<Value>,
    /// What needs doing.
    #[serde(default)]
    pub description: Option<Value>,
    /// `Personal` or `Professional`.
    #[serde(default)]
    pub category: Option<Value>,
}

/// Request DTO for updating a task.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTaskRequest {
    /// New description.
    #[serde(default)]
    pub description: Option<Value>,
    /// New completion flag.
    #[serde(default)]
    pub completed: Option<Value>,
}

/// Response DTO for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    /// Task ID.
    pub id: String,
    /// Description of the task.
    pub description: String,
    /// Category of the task.
    pub category: Category,
    /// Whether the task is done.
    pub completed: bool,
    /// Creation timestamp.
    pub created_at: String,
    /// Last update timestamp.
    pub updated_at: String,
}

impl From<&Task> for TaskResponse {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.to_string(),
            description: task.description.clone(),
            category: task.category,
            completed: task.completed,
            created_at: task.created_at.to_string(),
            updated_at: task.updated_at.to_string(),
        }
    }
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self::from(&task)
    }
}

/// Health check response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Current server time.
    pub time_stamp: String,
}

// =============================================================================
// Validation
// =============================================================================

/// A create request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCreateTask {
    pub id: Option<TaskId>,
    pub description: String,
    pub category: Category,
}

/// Validates a create task request.
///
/// # Validation Rules
///
/// - `description` must be a string with non-whitespace content
/// - `category` must be the string `Personal` or `Professional`
/// - `id`, when present, must be a hyphenated UUID v4 string
///
/// # Errors
///
/// Returns a [`ValidationError`] describing the first offending field.
pub fn validate_create_request(
    request: &CreateTaskRequest,
) -> Result<ValidatedCreateTask, ValidationError> {
    let description = match request.description.as_ref() {
        Some(Value::String(description)) => description.clone(),
        _ => {
            return Err(ValidationError::single(
                "description",
                "Description is required and must be a string",
            ));
        }
    };
    ensure_visible_description(&description)?;

    let category = match request.category.as_ref() {
        Some(Value::String(category)) => category.parse::<Category>().map_err(|_| {
            ValidationError::single("category", "Category must be one of: Personal, Professional")
        })?,
        _ => {
            return Err(ValidationError::single(
                "category",
                "Category is required and must be a string",
            ));
        }
    };

    let id = match request.id.as_ref() {
        None => None,
        Some(Value::String(text)) => Some(TaskId::parse_v4(text).map_err(|_| {
            ValidationError::single("id", "Task ID must be a UUID v4 string")
        })?),
        Some(_) => {
            return Err(ValidationError::single(
                "id",
                "Task ID must be a UUID v4 string",
            ));
        }
    };

    Ok(ValidatedCreateTask {
        id,
        description,
        category,
    })
}

/// Validates an update task request and converts it into a [`TaskPatch`].
///
/// # Validation Rules
///
/// - at least one of `description` / `completed` must be present
/// - `description`, when present, must be a string with non-whitespace content
/// - `completed`, when present, must be a boolean
///
/// # Errors
///
/// Returns a [`ValidationError`] describing the first offending field.
pub fn validate_update_request(request: &UpdateTaskRequest) -> Result<TaskPatch, ValidationError> {
    if request.description.is_none() && request.completed.is_none() {
        return Err(ValidationError::single(
            "body",
            "At least one field (description or completed) must be provided",
        ));
    }

    let description = match request.description.as_ref() {
        None => None,
        Some(Value::String(description)) => {
            ensure_visible_description(description)?;
            Some(description.clone())
        }
        Some(_) => {
            return Err(ValidationError::single(
                "description",
                "Description must be a string",
            ));
        }
    };

    let completed = match request.completed.as_ref() {
        None => None,
        Some(Value::Bool(completed)) => Some(*completed),
        Some(_) => {
            return Err(ValidationError::single(
                "completed",
                "Completed must be a boolean value",
            ));
        }
    };

    Ok(TaskPatch {
        description,
        completed,
    })
}

/// Parses the `{id}` path segment.
///
/// # Errors
///
/// Returns a 400 response when the segment is not a hyphenated UUID v4.
pub fn parse_task_id(raw: &str) -> Result<TaskId, ApiErrorResponse> {
    TaskId::parse_v4(raw).map_err(|_| ApiErrorResponse::invalid_task_id())
}

fn ensure_visible_description(description: &str) -> Result<(), ValidationError> {
    validate_description(description).map_err(|_| {
        ValidationError::single(
            "description",
            "Description cannot be empty or whitespace only",
        )
    })
}

// =============================================================================
// Tests
// =============================================================================
