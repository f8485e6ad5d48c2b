use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use crate::error::{Error, Result, TaskError};
use crate::limits;

/// Result of one task: the worker's payload or the reason it failed.
pub type Outcome<P> = std::result::Result<P, TaskError>;

/// One finished task, attributed to the descriptor it was submitted with.
#[derive(Debug)]
pub struct Completion<T, P> {
    /// Position of the task in the submitted batch.
    pub id: usize,
    pub task: Arc<T>,
    pub outcome: Outcome<P>,
}

pub struct Config {
    pub max_workers: usize,
    pub deadline: Option<Duration>,
}

pub fn config(max_workers: usize, deadline: Option<Duration>) -> Result<Config> {
    if max_workers == 0 {
        return Err(Error::InvalidConfig(
            "worker count must be at least 1".to_string(),
        ));
    }

    Ok(Config {
        max_workers,
        deadline,
    })
}

/// Completion-ordered stream of a running batch.
///
/// Yields exactly one [`Completion`] per submitted task, then ends. Dropping
/// it cancels whatever is still queued or running.
pub struct Dispatch<T, P> {
    pub total: u64,
    rx: mpsc::Receiver<Completion<T, P>>,
    _guard: DropGuard,
}

impl<T, P> Dispatch<T, P> {
    pub async fn next(&mut self) -> Option<Completion<T, P>> {
        self.rx.recv().await
    }

    pub async fn collect(mut self) -> Vec<Completion<T, P>> {
        let mut completions = Vec::with_capacity(self.total as usize);
        while let Some(completion) = self.next().await {
            completions.push(completion);
        }
        completions
    }
}

/// Start a batch. At most `config.max_workers` tasks run at once; queued
/// tasks start in submission order as slots free up.
///
/// Each worker receives a cancellation token that fires when the batch
/// deadline expires or the [`Dispatch`] is dropped. Must be called from
/// within a tokio runtime.
pub fn spawn<T, P, F, Fut>(config: &Config, tasks: Vec<T>, mut worker: F) -> Dispatch<T, P>
where
    T: Send + Sync + 'static,
    P: Send + 'static,
    F: FnMut(Arc<T>, CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = Outcome<P>> + Send + 'static,
{
    let total = tasks.len();
    let slots = config
        .max_workers
        .min(total)
        .clamp(1, Semaphore::MAX_PERMITS);

    let sem = Arc::new(Semaphore::new(slots));
    let (tx, rx) = mpsc::channel(limits::compute_channel_size(slots));
    let cancel = CancellationToken::new();

    if let Some(deadline) = config.deadline {
        spawn_deadline(cancel.clone(), deadline);
    }

    let batch = cancel.clone();
    tokio::spawn(async move {
        let mut queue = tasks.into_iter().map(Arc::new).enumerate();

        while let Some((id, task)) = queue.next() {
            let permit = tokio::select! {
                biased;
                _ = batch.cancelled() => None,
                permit = sem.clone().acquire_owned() => permit.ok(),
            };

            let Some(permit) = permit else {
                // Never started: still owed a record each.
                for (id, task) in std::iter::once((id, task)).chain(queue.by_ref()) {
                    let outcome = Err(TaskError::Cancelled);
                    let _ = tx.send(Completion { id, task, outcome }).await;
                }
                break;
            };

            debug!(id, "task started");
            let started = panic::catch_unwind(AssertUnwindSafe(|| {
                worker(task.clone(), batch.child_token())
            }));
            let work = match started {
                Ok(future) => tokio::spawn(future),
                Err(payload) => {
                    let err = TaskError::Panicked(panic_message(payload));
                    tokio::spawn(async move { Err(err) })
                }
            };
            let batch = batch.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let outcome = settle(work, &batch).await;
                drop(permit);

                match &outcome {
                    Ok(_) => debug!(id, "task succeeded"),
                    Err(err) => debug!(id, error = %err, "task failed"),
                }
                let _ = tx.send(Completion { id, task, outcome }).await;
            });
        }
    });

    Dispatch {
        total: total as u64,
        rx,
        _guard: cancel.drop_guard(),
    }
}

async fn settle<P>(mut work: JoinHandle<Outcome<P>>, cancel: &CancellationToken) -> Outcome<P> {
    tokio::select! {
        biased;
        joined = &mut work => joined.unwrap_or_else(|err| Err(join_failure(err))),
        _ = cancel.cancelled() => {
            work.abort();
            Err(TaskError::Cancelled)
        }
    }
}

/// Map a failed join (panic or abort) to a task failure.
pub fn join_failure(err: JoinError) -> TaskError {
    if err.is_cancelled() {
        return TaskError::Cancelled;
    }
    TaskError::Panicked(panic_message(err.into_panic()))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn spawn_deadline(cancel: CancellationToken, deadline: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(deadline) => {
                warn!(?deadline, "batch deadline expired, cancelling outstanding tasks");
                cancel.cancel();
            }
            _ = cancel.cancelled() => {}
        }
    });
}
