//! Route configuration for the task API.
//!
//! # Routes
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | GET | /api/tasks | `list_tasks` |
//! | POST | /api/tasks | `create_task` |
//! | GET | /api/tasks/{id} | `get_task` |
//! | PUT | /api/tasks/{id} | `update_task` |
//! | DELETE | /api/tasks/{id} | `delete_task` |
//! | GET | /health | `health_check` |
//!
//! Anything else, including a known path with an unsupported method, gets
//! the 404 `Route not Found` body.

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    AppState, create_task, delete_task, get_task, health_check, list_tasks, route_not_found,
    update_task,
};

/// Base path of the task collection.
pub const TASKS_PATH: &str = "/api/tasks";

/// Creates the router with all API routes, CORS and request tracing.
///
/// # Example
///
/// ```rust,ignore
/// let router = create_router(AppState::in_memory());
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
/// axum::serve(listener, router).await?;
/// ```
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route(TASKS_PATH, get(list_tasks).post(create_task))
        .route(
            "/api/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .fallback(route_not_found)
        .method_not_allowed_fallback(route_not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
