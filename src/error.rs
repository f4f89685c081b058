// src/error.rs
//! Errors surfaced by the drain loop and by `run`.

use std::time::Duration;

use thiserror::Error;

use crate::task::{OwnerId, TaskFailure, TaskId};

/// Errors returned by [`Owner::wait`](crate::Owner::wait) and friends.
///
/// None of these leave the queue or the registry in a partial state: a
/// later `wait` picks up exactly where the failed one stopped.
#[derive(Debug, Error)]
pub enum AsyncQueueError {
    /// The owner's blocking wait was interrupted through an
    /// [`Interrupter`](crate::Interrupter).
    #[error("interrupted while waiting on the message queue of {owner}")]
    Interrupted {
        /// The owner whose wait was interrupted.
        owner: OwnerId,
    },

    /// `wait_timeout` reached its deadline with the condition still false.
    #[error("gave up waiting on the message queue of {owner} after {timeout:?}")]
    TimedOut {
        /// The owner that was waiting.
        owner: OwnerId,
        /// The timeout that expired.
        timeout: Duration,
    },

    /// A task failed and the dispatcher is configured with
    /// [`FailurePolicy::Propagate`](crate::FailurePolicy::Propagate).
    #[error(transparent)]
    TaskFailed(#[from] TaskFailure),

    /// The OS refused to start a worker thread. The task was rolled back.
    #[error("could not start a worker thread for {task}")]
    Spawn {
        /// The task that was never started.
        task: TaskId,
        /// The underlying spawn error.
        #[source]
        source: std::io::Error,
    },
}

impl AsyncQueueError {
    #[inline]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, AsyncQueueError::Interrupted { .. })
    }

    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, AsyncQueueError::TimedOut { .. })
    }
}
