// src/owner.rs
use crate::{
    condition::{AllDelivered, FinishCondition, OutstandingAtMost},
    config::FailurePolicy,
    dispatcher::Dispatcher,
    error::AsyncQueueError,
    interrupt::Interrupter,
    queue::{AnyBox, Message, Payload, QueueRecv},
    task::{FailureReason, OwnerId, TaskFailure, TaskId, TaskKind},
};

use std::{
    cell::RefCell,
    collections::HashMap,
    fmt::{self, Display},
    marker::PhantomData,
    time::{Duration, Instant},
};

type PendingCallback = Box<dyn FnOnce(AnyBox) -> Result<(), FailureReason>>;
type FailureHandler = Box<dyn FnMut(TaskFailure)>;

/// The receiving side of a dispatcher, held by exactly one thread.
///
/// `Owner` is neither `Send` nor `Sync`: every callback it delivers runs on
/// the thread holding it, inside one of the `wait*` drain loops. Callbacks
/// given to [`run`](Self::run) therefore do not need to be `Send`.
pub struct Owner {
    id: OwnerId,
    dispatcher: Dispatcher,

    pending: RefCell<HashMap<TaskId, PendingCallback>>,
    failure_handler: RefCell<Option<FailureHandler>>,

    _not_send: PhantomData<*const ()>,
}

impl Owner {
    pub(crate) fn new(dispatcher: Dispatcher, id: OwnerId) -> Self {
        Self {
            id,
            dispatcher,
            pending: RefCell::new(HashMap::new()),
            failure_handler: RefCell::new(None),
            _not_send: PhantomData,
        }
    }

    #[inline]
    pub fn id(&self) -> OwnerId {
        self.id
    }

    #[inline]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Creates this owner's queue so other threads can target it. Idempotent.
    #[inline]
    pub fn prepare(&self) {
        self.dispatcher.prepare(self.id);
    }

    // ---------------- dispatching ----------------

    /// Runs `action(argument)` on a new thread. `callback` receives the
    /// result on this thread during a later `wait*`.
    ///
    /// The task is outstanding as soon as this returns. If `action` panics,
    /// the panic is delivered as a failure instead of a result.
    pub fn run<P, R, A, C>(&self, action: A, callback: C, argument: P) -> Result<TaskId, AsyncQueueError>
    where
        P: Send + 'static,
        R: Send + 'static,
        A: FnOnce(P) -> R + Send + 'static,
        C: FnOnce(R) + 'static,
    {
        self.submit(move |p| Ok(action(p)), callback, argument)
    }

    /// Like [`run`](Self::run) for fallible actions: `Err(e)` is delivered
    /// as a failure carrying `e.to_string()`.
    pub fn try_run<P, R, E, A, C>(&self, action: A, callback: C, argument: P) -> Result<TaskId, AsyncQueueError>
    where
        P: Send + 'static,
        R: Send + 'static,
        E: Display,
        A: FnOnce(P) -> Result<R, E> + Send + 'static,
        C: FnOnce(R) + 'static,
    {
        self.submit(
            move |p| action(p).map_err(|e| FailureReason::Error(e.to_string())),
            callback,
            argument,
        )
    }

    fn submit<P, R, A, C>(&self, action: A, callback: C, argument: P) -> Result<TaskId, AsyncQueueError>
    where
        P: Send + 'static,
        R: Send + 'static,
        A: FnOnce(P) -> Result<R, FailureReason> + Send + 'static,
        C: FnOnce(R) + 'static,
    {
        let queue = self.dispatcher.queue_for(self.id);
        let task = self.dispatcher.next_task_id();

        let deliver: PendingCallback = Box::new(move |value: AnyBox| match value.downcast::<R>() {
            Ok(v) => {
                callback(*v);
                Ok(())
            }
            Err(_) => Err(FailureReason::Error(format!(
                "result is not a {}",
                std::any::type_name::<R>()
            ))),
        });
        self.pending.borrow_mut().insert(task, deliver);
        self.dispatcher.register(self.id, task, TaskKind::Spawned);

        if let Err(e) = self.dispatcher.spawn_worker(queue, task, action, argument) {
            self.dispatcher.registry().unregister(self.id, task);
            self.pending.borrow_mut().remove(&task);
            return Err(e);
        }
        Ok(task)
    }

    /// Same as [`Dispatcher::handle_message`], for an owner that has its
    /// handle at hand.
    #[inline]
    pub fn handle_message<V, F>(&self, value: V, target: OwnerId, callback: F) -> TaskId
    where
        V: Send + 'static,
        F: FnOnce(V) + Send + 'static,
    {
        self.dispatcher.handle_message(value, target, callback)
    }

    // ---------------- introspection ----------------

    /// Number of tasks whose callback has not run yet.
    #[inline]
    pub fn outstanding(&self) -> usize {
        self.dispatcher.outstanding(self.id)
    }

    #[inline]
    pub fn outstanding_tasks(&self) -> Vec<TaskId> {
        self.dispatcher.registry().outstanding(self.id)
    }

    #[inline]
    pub fn all_delivered(&self) -> AllDelivered<'_> {
        OutstandingAtMost::all_delivered(self.dispatcher.registry(), self.id)
    }

    #[inline]
    pub fn outstanding_at_most(&self, limit: usize) -> OutstandingAtMost<'_> {
        OutstandingAtMost::new(self.dispatcher.registry(), self.id, limit)
    }

    /// A handle other threads can use to break this owner out of a wait.
    pub fn interrupter(&self) -> Interrupter {
        Interrupter::new(self.dispatcher.queue_for(self.id))
    }

    /// Installs the handler that receives failed tasks under
    /// [`FailurePolicy::Report`]. Replaces any previous handler.
    pub fn on_failure(&self, handler: impl FnMut(TaskFailure) + 'static) {
        *self.failure_handler.borrow_mut() = Some(Box::new(handler));
    }

    // ---------------- draining ----------------

    /// Drains until every outstanding task of this owner has been delivered.
    #[inline]
    pub fn wait(&self) -> Result<(), AsyncQueueError> {
        self.wait_until(self.all_delivered())
    }

    /// Drains until `condition` holds. Undelivered work stays queued for
    /// the next call.
    ///
    /// Queued messages are delivered before a pending interruption is
    /// reported, so producers that keep the queue non-empty delay the
    /// interruption until the queue runs dry or `condition` holds.
    #[inline]
    pub fn wait_until<C: FinishCondition>(&self, condition: C) -> Result<(), AsyncQueueError> {
        self.drain(condition, None)
    }

    /// Like [`wait_until`](Self::wait_until), but gives up with
    /// [`AsyncQueueError::TimedOut`] when it would have to block past
    /// `timeout` from now.
    #[inline]
    pub fn wait_timeout<C: FinishCondition>(&self, condition: C, timeout: Duration) -> Result<(), AsyncQueueError> {
        self.drain(condition, Some(timeout))
    }

    /// Delivers whatever is queued right now without blocking. Returns the
    /// number of messages delivered.
    pub fn drain_ready(&self) -> Result<usize, AsyncQueueError> {
        let queue = self.dispatcher.queue_for(self.id);
        let mut n = 0usize;
        while let Some(msg) = queue.try_pop() {
            n += 1;
            self.deliver(msg)?;
        }
        Ok(n)
    }

    fn drain<C: FinishCondition>(&self, mut condition: C, timeout: Option<Duration>) -> Result<(), AsyncQueueError> {
        let queue = self.dispatcher.queue_for(self.id);
        // a deadline past the clock's range never expires
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));

        loop {
            if condition.all_finished() {
                return Ok(());
            }

            if queue.is_empty() {
                self.dispatcher.tracer().on_wait(self.id, self.outstanding());
            }

            let recv = match deadline {
                Some(_) => queue.pop_until(deadline),
                None => queue.pop_blocking(),
            };
            match recv {
                QueueRecv::Msg(msg) => self.deliver(msg)?,
                QueueRecv::Interrupted => {
                    return Err(AsyncQueueError::Interrupted { owner: self.id });
                }
                QueueRecv::TimedOut => {
                    return Err(AsyncQueueError::TimedOut {
                        owner: self.id,
                        timeout: timeout.unwrap_or_default(),
                    });
                }
            }
        }
    }

    fn deliver(&self, msg: Message) -> Result<(), AsyncQueueError> {
        let Message { owner, task, payload } = msg;
        debug_assert_eq!(owner, self.id);

        self.dispatcher.registry().unregister(owner, task);
        self.dispatcher.tracer().on_deliver(owner, task);

        match payload {
            Payload::Completed(value) => {
                // Take it out first: the callback may call back into `run`.
                let callback = self.pending.borrow_mut().remove(&task);
                match callback {
                    Some(callback) => {
                        if let Err(reason) = callback(value) {
                            return self.fail(task, reason);
                        }
                    }
                    None => self.dispatcher.tracer().on_unclaimed(owner, task),
                }
                Ok(())
            }
            Payload::Injected(deliver) => {
                deliver();
                Ok(())
            }
            Payload::Failed(reason) => {
                self.pending.borrow_mut().remove(&task);
                self.fail(task, reason)
            }
        }
    }

    fn fail(&self, task: TaskId, reason: FailureReason) -> Result<(), AsyncQueueError> {
        self.dispatcher.tracer().on_failure(self.id, task, &reason);
        let failure = TaskFailure { owner: self.id, task, reason };

        match self.dispatcher.config().failure_policy {
            FailurePolicy::Propagate => Err(failure.into()),
            FailurePolicy::Report => {
                let handler = self.failure_handler.borrow_mut().take();
                if let Some(mut handler) = handler {
                    handler(failure);
                    let mut slot = self.failure_handler.borrow_mut();
                    // keep a handler installed from inside the call
                    if slot.is_none() {
                        *slot = Some(handler);
                    }
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owner")
            .field("id", &self.id)
            .field("pending", &self.pending.borrow().len())
            .finish()
    }
}
