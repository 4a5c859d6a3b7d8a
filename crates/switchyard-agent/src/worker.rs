use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use switchyard_core::error::{Result, SwitchyardError};
use switchyard_core::types::TaskId;

use crate::driver::TaskDriver;

/// A queued unit of work. The queue's job id is the task id.
#[derive(Debug, Clone)]
pub struct TaskJob {
    pub task_id: TaskId,
    pub prompt: String,
}

/// Bounded FIFO feeding the worker pool.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<TaskJob>,
}

impl TaskQueue {
    /// Create a queue and return (queue_handle, receiver).
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<TaskJob>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Enqueue a job without waiting. A full or closed queue is an error.
    pub fn enqueue(&self, job: TaskJob) -> Result<()> {
        let task_id = job.task_id.clone();
        self.tx.try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => {
                SwitchyardError::Queue(format!("queue full, task {} not enqueued", task_id))
            }
            TrySendError::Closed(_) => {
                SwitchyardError::Queue(format!("queue closed, task {} not enqueued", task_id))
            }
        })?;
        debug!(task_id = %task_id, "Task enqueued");
        Ok(())
    }
}

/// Reason recorded for jobs still queued when the pool shuts down.
pub const SHUTDOWN_REASON: &str = "worker shut down before execution";

/// Fixed set of workers draining a [`TaskQueue`].
///
/// Each job runs to completion on one worker. A failed job is logged and the
/// worker moves on; the failure itself is already recorded by the driver.
/// Jobs left in the queue at shutdown are recorded as failed.
pub struct WorkerPool {
    driver: Arc<TaskDriver>,
    concurrency: usize,
    cancel: CancellationToken,
}

impl WorkerPool {
    pub fn new(driver: Arc<TaskDriver>, concurrency: usize, cancel: CancellationToken) -> Self {
        Self {
            driver,
            concurrency: concurrency.max(1),
            cancel,
        }
    }

    /// Run until cancelled or until every queue handle is dropped and the
    /// queue is drained. Tasks already running are allowed to finish.
    pub async fn run(self, rx: mpsc::Receiver<TaskJob>) {
        let rx = Arc::new(Mutex::new(rx));
        info!(concurrency = self.concurrency, "Worker pool started");

        let mut handles = Vec::with_capacity(self.concurrency);
        for worker in 0..self.concurrency {
            let rx = rx.clone();
            let driver = self.driver.clone();
            let cancel = self.cancel.clone();
            handles.push(tokio::spawn(worker_loop(worker, rx, driver, cancel)));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker panicked");
            }
        }

        let mut rx = rx.lock().await;
        rx.close();
        let mut abandoned = 0usize;
        while let Ok(job) = rx.try_recv() {
            self.driver.abandon(&job.task_id, SHUTDOWN_REASON).await;
            abandoned += 1;
        }
        if abandoned > 0 {
            warn!(abandoned, "Queued tasks failed at shutdown");
        }
        info!("Worker pool stopped");
    }
}

async fn worker_loop(
    worker: usize,
    rx: Arc<Mutex<mpsc::Receiver<TaskJob>>>,
    driver: Arc<TaskDriver>,
    cancel: CancellationToken,
) {
    loop {
        // Cancellation wins over queued work
        let job = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(worker, "Worker cancelled");
                break;
            }
            job = async { rx.lock().await.recv().await } => job,
        };

        let Some(job) = job else {
            debug!(worker, "Task queue closed");
            break;
        };

        info!(worker, task_id = %job.task_id, "Worker picked up task");
        if let Err(e) = driver.execute(&job.task_id, &job.prompt).await {
            error!(worker, task_id = %job.task_id, error = %e, "Task execution failed");
        }
    }
}
