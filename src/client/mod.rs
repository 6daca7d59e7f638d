//! Offline-first client for the task service.
//!
//! - [`storage`]: durable key-value store and the task mirror
//! - [`remote`]: HTTP client for the REST API
//! - [`outbox`] and [`worker`]: ordered background sync with retry
//! - [`board`]: the optimistic [`TaskBoard`]

pub mod board;
pub mod outbox;
pub mod remote;
pub mod storage;
pub mod worker;

pub use board::TaskBoard;
pub use outbox::{OUTBOX_KEY, Outbox, PendingOp, overlay_pending};
pub use remote::{HttpTaskApi, NewTask, RemoteError, TaskApi};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError, TASKS_KEY, TaskMirror};
pub use worker::{FlushReport, SyncHandle};
