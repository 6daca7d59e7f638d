//! Infrastructure module for server-side storage.
//!
//! The REST service reaches its task collection only through the
//! [`TaskRepository`] trait.

pub mod in_memory;
pub mod repository;

pub use in_memory::InMemoryTaskRepository;
pub use repository::{RepositoryError, TaskRepository};
