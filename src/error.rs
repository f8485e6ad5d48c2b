use std::io;
use std::time::Duration;

use thiserror::Error;

/// Why a single task failed. Captured at the task boundary and reported
/// through the result stream, never propagated into the pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Network failure, non-2xx status or unreadable body.
    #[error("transport error: {0}")]
    Transport(String),

    /// The task did not finish within its own time limit.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The task input could not be turned into work (bad URL, impossible target).
    #[error("invalid task: {0}")]
    Construction(String),

    /// The batch deadline expired or the batch was dropped.
    #[error("cancelled")]
    Cancelled,

    /// The worker panicked.
    #[error("worker panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FailureKind {
    Transport,
    Timeout,
    Construction,
    Cancelled,
    Panicked,
}

impl TaskError {
    pub fn kind(&self) -> FailureKind {
        match self {
            TaskError::Transport(_) => FailureKind::Transport,
            TaskError::Timeout(_) => FailureKind::Timeout,
            TaskError::Construction(_) => FailureKind::Construction,
            TaskError::Cancelled => FailureKind::Cancelled,
            TaskError::Panicked(_) => FailureKind::Panicked,
        }
    }
}

/// Errors that abort the whole run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
