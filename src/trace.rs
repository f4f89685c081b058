// src/trace.rs
use crate::task::{FailureReason, OwnerId, TaskId, TaskKind};

use parking_lot::Mutex;

/// Lifecycle hooks. Called from the owner thread and from worker threads,
/// hence `Send + Sync` and `&self`.
///
/// Hooks run on the hot path of producers and of the drain loop; keep them
/// cheap. No dispatcher lock is held while a hook runs, so a hook may read
/// [`Dispatcher::queued`](crate::Dispatcher::queued) and friends, but it
/// must not block on the owner it is tracing.
pub trait Tracer: Send + Sync {
    fn on_prepare(&self, _owner: OwnerId) {}
    fn on_register(&self, _owner: OwnerId, _task: TaskId, _kind: TaskKind) {}
    fn on_spawn(&self, _owner: OwnerId, _task: TaskId, _thread: &str) {}

    /// `queued` counts the message itself. Under concurrent pushes it is
    /// a snapshot, not an exact position.
    fn on_push(&self, _owner: OwnerId, _task: TaskId, _queued: usize) {}

    fn on_wait(&self, _owner: OwnerId, _outstanding: usize) {}
    fn on_deliver(&self, _owner: OwnerId, _task: TaskId) {}
    fn on_failure(&self, _owner: OwnerId, _task: TaskId, _reason: &FailureReason) {}
    /// A result arrived for a task with no pending callback; it is dropped.
    fn on_unclaimed(&self, _owner: OwnerId, _task: TaskId) {}
    fn on_interrupt(&self, _owner: OwnerId) {}
}

/// Forwards every hook to `tracing`.
pub struct LogTracer;
impl Tracer for LogTracer {
    fn on_prepare(&self, owner: OwnerId) {
        tracing::trace!(%owner, "queue ready");
    }
    fn on_register(&self, owner: OwnerId, task: TaskId, kind: TaskKind) {
        tracing::trace!(%owner, %task, ?kind, "task registered");
    }
    fn on_spawn(&self, owner: OwnerId, task: TaskId, thread: &str) {
        tracing::debug!(%owner, %task, thread, "worker started");
    }
    fn on_push(&self, owner: OwnerId, task: TaskId, queued: usize) {
        tracing::trace!(%owner, %task, queued, "message queued");
    }
    fn on_wait(&self, owner: OwnerId, outstanding: usize) {
        tracing::trace!(%owner, outstanding, "blocking on queue");
    }
    fn on_deliver(&self, owner: OwnerId, task: TaskId) {
        tracing::debug!(%owner, %task, "delivering result");
    }
    fn on_failure(&self, owner: OwnerId, task: TaskId, reason: &FailureReason) {
        tracing::warn!(%owner, %task, %reason, "task failed");
    }
    fn on_unclaimed(&self, owner: OwnerId, task: TaskId) {
        tracing::warn!(%owner, %task, "result delivered without a pending callback");
    }
    fn on_interrupt(&self, owner: OwnerId) {
        tracing::debug!(%owner, "wait interrupted");
    }
}

/// Stores trace lines in memory instead of emitting them.
pub struct BufferTracer {
    lines: Mutex<Vec<String>>,
}
impl BufferTracer {
    pub fn new() -> Self {
        Self { lines: Mutex::new(Vec::new()) }
    }
    pub fn push(&self, s: impl Into<String>) {
        self.lines.lock().push(s.into());
    }
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock())
    }
}
impl Default for BufferTracer {
    fn default() -> Self {
        Self::new()
    }
}
impl Tracer for BufferTracer {
    fn on_prepare(&self, owner: OwnerId) {
        self.push(format!("[prepare] {owner}"));
    }
    fn on_register(&self, owner: OwnerId, task: TaskId, kind: TaskKind) {
        self.push(format!("[register] {owner} {task} {kind:?}"));
    }
    fn on_spawn(&self, owner: OwnerId, task: TaskId, thread: &str) {
        self.push(format!("[spawn] {owner} {task} on {thread}"));
    }
    fn on_push(&self, owner: OwnerId, task: TaskId, queued: usize) {
        self.push(format!("[push] {owner} {task} queued={queued}"));
    }
    fn on_wait(&self, owner: OwnerId, outstanding: usize) {
        self.push(format!("[wait] {owner} outstanding={outstanding}"));
    }
    fn on_deliver(&self, owner: OwnerId, task: TaskId) {
        self.push(format!("[deliver] {owner} {task}"));
    }
    fn on_failure(&self, owner: OwnerId, task: TaskId, reason: &FailureReason) {
        self.push(format!("[failure] {owner} {task} {reason}"));
    }
    fn on_unclaimed(&self, owner: OwnerId, task: TaskId) {
        self.push(format!("[unclaimed] {owner} {task}"));
    }
    fn on_interrupt(&self, owner: OwnerId) {
        self.push(format!("[interrupt] {owner}"));
    }
}
