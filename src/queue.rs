// src/queue.rs
use crate::task::{FailureReason, OwnerId, TaskId};
use crate::trace::Tracer;

use parking_lot::{Condvar, Mutex};
use std::{any::Any, collections::VecDeque, fmt, sync::Arc, time::Instant};

pub(crate) type AnyBox = Box<dyn Any + Send>;

pub(crate) enum Payload {
    /// Result of a spawned task. Its callback stays in the owner's pending table.
    Completed(AnyBox),
    /// Injected value already fused with its callback.
    Injected(Box<dyn FnOnce() + Send>),
    Failed(FailureReason),
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Completed(_) => f.write_str("Completed(..)"),
            Payload::Injected(_) => f.write_str("Injected(..)"),
            Payload::Failed(reason) => f.debug_tuple("Failed").field(reason).finish(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Message {
    pub(crate) owner: OwnerId,
    pub(crate) task: TaskId,
    pub(crate) payload: Payload,
}

#[derive(Debug)]
pub(crate) enum QueueRecv {
    Msg(Message),
    Interrupted,
    TimedOut,
}

struct State {
    messages: VecDeque<Message>,
    interrupted: bool,
}

/// One owner's inbox. Many producers, one consumer.
pub(crate) struct MessageQueue {
    owner: OwnerId,
    tracer: Arc<dyn Tracer>,
    state: Mutex<State>,
    ready: Condvar,
}

impl MessageQueue {
    pub(crate) fn new(owner: OwnerId, tracer: Arc<dyn Tracer>) -> Self {
        Self {
            owner,
            tracer,
            state: Mutex::new(State { messages: VecDeque::new(), interrupted: false }),
            ready: Condvar::new(),
        }
    }

    #[inline]
    pub(crate) fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Enqueue and wake one waiter. Returns the queue length after the push.
    ///
    /// The push is traced before the message becomes visible and outside
    /// the lock, so the trace precedes its delivery and the tracer may call
    /// back into the dispatcher.
    pub(crate) fn push(&self, msg: Message) -> usize {
        self.tracer.on_push(self.owner, msg.task, self.len() + 1);
        let queued = {
            let mut st = self.state.lock();
            st.messages.push_back(msg);
            st.messages.len()
        };
        self.ready.notify_one();
        queued
    }

    /// Flag the consumer's wait as interrupted. Held until a blocking pop
    /// observes it.
    pub(crate) fn interrupt(&self) {
        self.tracer.on_interrupt(self.owner);
        self.state.lock().interrupted = true;
        self.ready.notify_all();
    }

    #[inline]
    pub(crate) fn try_pop(&self) -> Option<Message> {
        self.state.lock().messages.pop_front()
    }

    #[inline]
    pub(crate) fn pop_blocking(&self) -> QueueRecv {
        self.pop_until(None)
    }

    /// Pops the front message, blocking while the queue is empty.
    ///
    /// A queued message always wins over a pending interruption, so
    /// interrupting never drops or reorders messages.
    pub(crate) fn pop_until(&self, deadline: Option<Instant>) -> QueueRecv {
        let mut st = self.state.lock();
        loop {
            if let Some(m) = st.messages.pop_front() {
                return QueueRecv::Msg(m);
            }
            if st.interrupted {
                st.interrupted = false;
                return QueueRecv::Interrupted;
            }
            match deadline {
                None => self.ready.wait(&mut st),
                Some(dl) => {
                    if Instant::now() >= dl {
                        return QueueRecv::TimedOut;
                    }
                    // Result ignored: the loop re-checks state and the clock.
                    let _ = self.ready.wait_until(&mut st, dl);
                }
            }
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.state.lock().messages.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
