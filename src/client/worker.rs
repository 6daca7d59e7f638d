//! Background sync worker.
//!
//! Board mutations hand their remote op to [`SyncHandle::dispatch`], which
//! never blocks. A single tokio task performs the calls one at a time in
//! dispatch order. An op that fails retryably goes to the [`Outbox`], and
//! once the outbox is non-empty every later op queues behind it until a
//! flush drains it.
//!
//! A failed send may still have reached the server, so creates are marked
//! as attempted when they are queued after a failure.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::outbox::{Outbox, PendingOp};
use super::remote::{NewTask, RemoteError, TaskApi};
use super::storage::KeyValueStore;

/// Result of replaying the outbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Ops the server accepted (or had already applied).
    pub replayed: usize,
    /// Ops the server rejected for good.
    pub dropped: usize,
    /// Ops still queued.
    pub pending: usize,
}

enum SyncCommand {
    Dispatch(PendingOp),
    Flush(oneshot::Sender<FlushReport>),
    Settle(oneshot::Sender<()>),
}

/// What became of one attempt to send an op.
enum Outcome {
    Applied,
    Dropped,
    Retry(RemoteError),
}

/// Handle to the running worker.
pub struct SyncHandle {
    sender: mpsc::UnboundedSender<SyncCommand>,
    outbox: Arc<Mutex<Outbox>>,
    worker: JoinHandle<()>,
}

impl SyncHandle {
    /// Loads the outbox from `store` and spawns the worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(api: Arc<dyn TaskApi>, store: Arc<dyn KeyValueStore>) -> Self {
        let outbox = Arc::new(Mutex::new(Outbox::load(store)));
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run(api, Arc::clone(&outbox), receiver));

        Self {
            sender,
            outbox,
            worker,
        }
    }

    /// Hands `op` to the worker without waiting.
    pub fn dispatch(&self, op: PendingOp) {
        if let Err(mpsc::error::SendError(SyncCommand::Dispatch(op))) =
            self.sender.send(SyncCommand::Dispatch(op))
        {
            tracing::warn!(task_id = %op.task_id(), "Sync worker stopped, queueing op");
            self.outbox.lock().push(op);
        }
    }

    /// Replays the outbox, after every op dispatched so far.
    pub async fn flush(&self) -> FlushReport {
        let (reply, response) = oneshot::channel();
        if self.sender.send(SyncCommand::Flush(reply)).is_ok() {
            if let Ok(report) = response.await {
                return report;
            }
        }
        FlushReport {
            pending: self.pending_count(),
            ..FlushReport::default()
        }
    }

    /// Waits until every op dispatched so far has been handled.
    pub async fn settle(&self) {
        let (reply, response) = oneshot::channel();
        if self.sender.send(SyncCommand::Settle(reply)).is_ok() {
            let _ = response.await;
        }
    }

    /// Number of ops waiting in the outbox.
    pub fn pending_count(&self) -> usize {
        self.outbox.lock().len()
    }

    /// Snapshot of the ops waiting in the outbox.
    pub fn pending_ops(&self) -> Vec<PendingOp> {
        self.outbox.lock().pending()
    }

    /// Handles every dispatched op, then stops the worker.
    pub async fn shutdown(self) {
        drop(self.sender);
        if let Err(error) = self.worker.await {
            tracing::error!(%error, "Sync worker panicked");
        }
    }
}

async fn run(
    api: Arc<dyn TaskApi>,
    outbox: Arc<Mutex<Outbox>>,
    mut receiver: mpsc::UnboundedReceiver<SyncCommand>,
) {
    while let Some(command) = receiver.recv().await {
        match command {
            SyncCommand::Dispatch(op) => deliver(api.as_ref(), &outbox, op).await,
            SyncCommand::Flush(reply) => {
                let report = replay(api.as_ref(), &outbox).await;
                let _ = reply.send(report);
            }
            SyncCommand::Settle(reply) => {
                let _ = reply.send(());
            }
        }
    }
    tracing::debug!("Sync worker stopped");
}

async fn deliver(api: &dyn TaskApi, outbox: &Mutex<Outbox>, op: PendingOp) {
    let queued = !outbox.lock().is_empty();
    if queued {
        outbox.lock().push(op);
        return;
    }

    if let Outcome::Retry(error) = send(api, &op).await {
        tracing::warn!(task_id = %op.task_id(), %error, "Remote sync failed, queued for retry");
        outbox.lock().push(op.into_attempted());
    }
}

async fn replay(api: &dyn TaskApi, outbox: &Mutex<Outbox>) -> FlushReport {
    let mut report = FlushReport::default();

    loop {
        let next = outbox.lock().front().cloned();
        let Some(op) = next else { break };

        match send(api, &op).await {
            Outcome::Applied => report.replayed += 1,
            Outcome::Dropped => report.dropped += 1,
            Outcome::Retry(error) => {
                tracing::warn!(task_id = %op.task_id(), %error, "Replay stopped, service unavailable");
                outbox.lock().mark_front_attempted();
                break;
            }
        }
        outbox.lock().pop_front();
    }

    report.pending = outbox.lock().len();
    if report.replayed + report.dropped > 0 {
        tracing::info!(
            replayed = report.replayed,
            dropped = report.dropped,
            pending = report.pending,
            "Outbox replayed"
        );
    }
    report
}

/// Sends one op. Replays are idempotent by id: a create answered 409 and a
/// delete answered 404 have already been applied.
async fn send(api: &dyn TaskApi, op: &PendingOp) -> Outcome {
    let result = match op {
        PendingOp::Create { task, .. } => api.create_task(NewTask::from(task)).await.map(|_| ()),
        PendingOp::Update { id, patch } => api.update_task(id, patch).await.map(|_| ()),
        PendingOp::Delete { id } => api.delete_task(id).await,
    };

    let Err(error) = result else {
        return Outcome::Applied;
    };

    match (op, error.status()) {
        (PendingOp::Create { .. }, Some(409)) | (PendingOp::Delete { .. }, Some(404)) => {
            Outcome::Applied
        }
        (PendingOp::Update { .. }, Some(404)) => {
            tracing::warn!(task_id = %op.task_id(), "Dropping update of a task the server does not know");
            Outcome::Dropped
        }
        _ if error.is_retryable() => Outcome::Retry(error),
        _ => {
            tracing::error!(task_id = %op.task_id(), %error, "Remote sync rejected");
            Outcome::Dropped
        }
    }
}
