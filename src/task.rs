// src/task.rs
use std::{
    any::Any,
    fmt,
    time::Instant,
};

/// Identity of a thread that receives results. Only a [`Dispatcher`](crate::Dispatcher)
/// hands these out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(pub(crate) u64);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Started by `run`; executes on its own worker thread.
    Spawned,
    /// Pushed by `handle_message`; already complete when registered.
    Injected,
}

/// Registry entry for a task that has not been delivered yet.
#[derive(Debug, Clone, Copy)]
pub struct TaskRecord {
    pub id: TaskId,
    pub kind: TaskKind,
    pub registered_at: Instant,
}

impl TaskRecord {
    pub(crate) fn new(id: TaskId, kind: TaskKind) -> Self {
        Self { id, kind, registered_at: Instant::now() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The action panicked; carries the panic message when it was a string.
    Panicked(String),
    /// The action returned `Err`; carries its `Display` rendering.
    Error(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Panicked(msg) => write!(f, "panicked: {msg}"),
            FailureReason::Error(msg) => write!(f, "returned error: {msg}"),
        }
    }
}

impl FailureReason {
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        FailureReason::Panicked(msg)
    }
}

/// A task whose action did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{task} for {owner} {reason}")]
pub struct TaskFailure {
    pub owner: OwnerId,
    pub task: TaskId,
    pub reason: FailureReason,
}
