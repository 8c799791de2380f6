use tokio::sync::oneshot;

use crate::engine::tasks::descriptor::TaskOutput;
use crate::engine::tasks::error::TaskError;

pub type TaskResult = Result<TaskOutput, TaskError>;

/// Scheduler-side half of a task's deferred result. Owned by the registry
/// and consumed exactly once on settlement.
#[derive(Debug)]
pub struct DeferredResult {
    tx: oneshot::Sender<TaskResult>,
}

impl DeferredResult {
    pub fn channel() -> (Self, TaskTicket) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, TaskTicket { rx })
    }

    /// Settling after the consumer dropped its ticket is a no-op.
    pub fn settle(self, result: TaskResult) {
        let _ = self.tx.send(result);
    }
}

/// Consumer-side handle returned at registration, awaited independently of
/// scheduler timing.
#[derive(Debug)]
pub struct TaskTicket {
    rx: oneshot::Receiver<TaskResult>,
}

impl TaskTicket {
    /// Waits for the task to settle. Reports `Abandoned` when the task was
    /// unregistered without ever settling.
    pub async fn settled(self) -> TaskResult {
        self.rx.await.unwrap_or(Err(TaskError::Abandoned))
    }
}
