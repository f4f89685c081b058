// src/interrupt.rs
use crate::queue::MessageQueue;
use crate::task::OwnerId;

use std::sync::Arc;

/// Breaks an owner out of a blocking wait, from any thread.
///
/// The owner's current blocking `wait*` (or the next one to block, if none
/// is blocked right now) returns [`AsyncQueueError::Interrupted`](crate::AsyncQueueError::Interrupted).
/// Queued messages are never dropped by an interruption: they are all
/// delivered first, so while producers keep the owner's queue non-empty the
/// interruption is not observed. Pair it with a condition that can become
/// true if that matters.
#[derive(Clone)]
pub struct Interrupter {
    queue: Arc<MessageQueue>,
}

impl Interrupter {
    pub(crate) fn new(queue: Arc<MessageQueue>) -> Self {
        Self { queue }
    }

    #[inline]
    pub fn interrupt(&self) {
        self.queue.interrupt();
    }

    #[inline]
    pub fn owner(&self) -> OwnerId {
        self.queue.owner()
    }
}

impl std::fmt::Debug for Interrupter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interrupter").field("owner", &self.owner()).finish()
    }
}
