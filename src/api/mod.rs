//! API module for HTTP handlers.
//!
//! This module contains route definitions and request/response handlers.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;

pub use dto::{ApiResponse, CreateTaskRequest, HealthResponse, TaskResponse, UpdateTaskRequest};
pub use error::{ApiError, ApiErrorResponse, FieldError, ValidationError};
pub use handlers::{
    AppState, create_task, delete_task, get_task, health_check, list_tasks, route_not_found,
    update_task,
};
pub use routes::{TASKS_PATH, create_router};
