//! Domain module for task tracking.
//!
//! This module contains the task model and its value objects. Both the
//! REST service and the sync client speak in these types.

pub mod task;

pub use task::{
    Category, Task, TaskId, TaskIdError, TaskPatch, TaskValidationError, Timestamp,
    validate_description,
};
