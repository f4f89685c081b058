// src/dispatcher.rs
use crate::{
    config::DispatcherConfig,
    error::AsyncQueueError,
    owner::Owner,
    queue::{Message, MessageQueue, Payload},
    registry::TaskRegistry,
    task::{FailureReason, OwnerId, TaskId, TaskKind, TaskRecord},
    trace::{LogTracer, Tracer},
};

use dashmap::DashMap;
use std::{
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread,
};

struct Shared {
    config: DispatcherConfig,
    tracer: Arc<dyn Tracer>,

    queues: DashMap<OwnerId, Arc<MessageQueue>>,
    registry: TaskRegistry,

    next_owner: AtomicU64,
    next_task: AtomicU64,
}

/// Owns every owner's queue and registry entry.
///
/// Cheap to clone; clones share state, so a clone can be moved into another
/// thread to inject messages with [`handle_message`](Self::handle_message).
/// Separate `Dispatcher::new()` instances share nothing.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_config(DispatcherConfig::default())
    }

    pub fn with_config(config: DispatcherConfig) -> Self {
        Self::with_tracer(config, Arc::new(LogTracer))
    }

    pub fn with_tracer(config: DispatcherConfig, tracer: Arc<dyn Tracer>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                tracer,
                queues: DashMap::new(),
                registry: TaskRegistry::new(),
                next_owner: AtomicU64::new(1),
                next_task: AtomicU64::new(1),
            }),
        }
    }

    #[inline]
    pub fn config(&self) -> &DispatcherConfig {
        &self.shared.config
    }

    #[inline]
    pub fn registry(&self) -> &TaskRegistry {
        &self.shared.registry
    }

    /// Hands out a fresh owner identity bound to the calling thread.
    ///
    /// No queue is created until the owner prepares, runs a task, or
    /// receives an injected message.
    pub fn register_owner(&self) -> Owner {
        let id = OwnerId(self.shared.next_owner.fetch_add(1, Ordering::Relaxed));
        Owner::new(self.clone(), id)
    }

    /// Makes sure `owner` has a queue. Idempotent.
    pub fn prepare(&self, owner: OwnerId) {
        self.queue_for(owner);
    }

    /// Delivers `value` to `target`'s drain loop as if `target` had run a
    /// task producing it. `callback` runs on the target's thread.
    pub fn handle_message<V, F>(&self, value: V, target: OwnerId, callback: F) -> TaskId
    where
        V: Send + 'static,
        F: FnOnce(V) + Send + 'static,
    {
        let queue = self.queue_for(target);
        let task = self.next_task_id();
        self.register(target, task, TaskKind::Injected);

        let deliver: Box<dyn FnOnce() + Send> = Box::new(move || callback(value));
        queue.push(Message { owner: target, task, payload: Payload::Injected(deliver) });
        task
    }

    /// Tasks registered for `owner` whose callback has not run yet.
    #[inline]
    pub fn outstanding(&self, owner: OwnerId) -> usize {
        self.shared.registry.size(owner)
    }

    /// Messages sitting in `owner`'s queue.
    pub fn queued(&self, owner: OwnerId) -> usize {
        self.shared.queues.get(&owner).map_or(0, |q| q.len())
    }

    pub fn queue_count(&self) -> usize {
        self.shared.queues.len()
    }

    // ---------------- internals ----------------

    pub(crate) fn queue_for(&self, owner: OwnerId) -> Arc<MessageQueue> {
        if let Some(q) = self.shared.queues.get(&owner) {
            return q.clone();
        }

        let mut created = false;
        let q = self
            .shared
            .queues
            .entry(owner)
            .or_insert_with(|| {
                created = true;
                Arc::new(MessageQueue::new(owner, self.shared.tracer.clone()))
            })
            .clone();

        if created {
            self.shared.tracer.on_prepare(owner);
        }
        q
    }

    #[inline]
    pub(crate) fn tracer(&self) -> &Arc<dyn Tracer> {
        &self.shared.tracer
    }

    #[inline]
    pub(crate) fn next_task_id(&self) -> TaskId {
        TaskId(self.shared.next_task.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn register(&self, owner: OwnerId, task: TaskId, kind: TaskKind) {
        self.shared.registry.register(owner, TaskRecord::new(task, kind));
        self.shared.tracer.on_register(owner, task, kind);
    }

    /// Runs `action(argument)` on a new named thread and pushes the outcome
    /// to `queue`. A panic inside `action` becomes a `Failed` message.
    pub(crate) fn spawn_worker<P, R, A>(
        &self,
        queue: Arc<MessageQueue>,
        task: TaskId,
        action: A,
        argument: P,
    ) -> Result<(), AsyncQueueError>
    where
        P: Send + 'static,
        R: Send + 'static,
        A: FnOnce(P) -> Result<R, FailureReason> + Send + 'static,
    {
        let owner = queue.owner();
        let name = format!("{}-{}", self.shared.config.thread_name_prefix, task);

        let mut builder = thread::Builder::new().name(name.clone());
        if let Some(size) = self.shared.config.stack_size {
            builder = builder.stack_size(size);
        }

        builder
            .spawn(move || {
                let payload = match catch_unwind(AssertUnwindSafe(move || action(argument))) {
                    Ok(Ok(value)) => Payload::Completed(Box::new(value)),
                    Ok(Err(reason)) => Payload::Failed(reason),
                    Err(panic) => Payload::Failed(FailureReason::from_panic(panic)),
                };
                queue.push(Message { owner, task, payload });
            })
            .map_err(|source| AsyncQueueError::Spawn { task, source })?;

        self.shared.tracer.on_spawn(owner, task, &name);
        Ok(())
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.shared.config)
            .field("queues", &self.shared.queues.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::BufferTracer;

    fn quiet() -> (Dispatcher, Arc<BufferTracer>) {
        let tracer = Arc::new(BufferTracer::new());
        let d = Dispatcher::with_tracer(DispatcherConfig::default(), tracer.clone());
        (d, tracer)
    }

    #[test]
    fn prepare_is_idempotent() {
        let (d, tracer) = quiet();
        let owner = d.register_owner();
        assert_eq!(d.queue_count(), 0);

        d.prepare(owner.id());
        d.prepare(owner.id());
        owner.prepare();
        assert_eq!(d.queue_count(), 1);
        assert!(Arc::ptr_eq(&d.queue_for(owner.id()), &d.queue_for(owner.id())));

        let prepares = tracer.lines().iter().filter(|l| l.starts_with("[prepare]")).count();
        assert_eq!(prepares, 1);
    }

    #[test]
    fn concurrent_prepare_creates_one_queue() {
        let (d, _) = quiet();
        let owner = d.register_owner().id();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let d = d.clone();
                thread::spawn(move || d.queue_for(owner))
            })
            .collect();
        let queues: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(d.queue_count(), 1);
        assert!(queues.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn injected_message_is_registered_before_it_is_queued() {
        let (d, tracer) = quiet();
        let owner = d.register_owner();

        let task = d.handle_message(5u32, owner.id(), |_| {});
        assert_eq!(d.outstanding(owner.id()), 1);
        assert_eq!(d.queued(owner.id()), 1);
        assert_eq!(d.registry().record(owner.id(), task).map(|r| r.kind), Some(TaskKind::Injected));

        let lines = tracer.lines();
        let reg = lines.iter().position(|l| l.starts_with("[register]")).unwrap();
        let push = lines.iter().position(|l| l.starts_with("[push]")).unwrap();
        assert!(reg < push);
    }

    #[test]
    fn owner_and_task_ids_are_unique() {
        let (d, _) = quiet();
        let a = d.register_owner();
        let b = d.register_owner();
        assert_ne!(a.id(), b.id());
        assert_ne!(d.next_task_id(), d.next_task_id());
    }

    #[test]
    fn dispatchers_do_not_share_state() {
        let (d1, _) = quiet();
        let (d2, _) = quiet();
        let a = d1.register_owner();
        d1.handle_message((), a.id(), |_| {});

        assert_eq!(d1.queue_count(), 1);
        assert_eq!(d2.queue_count(), 0);
        assert_eq!(d2.outstanding(a.id()), 0);
    }

    struct QueueReader {
        dispatcher: std::sync::OnceLock<Dispatcher>,
        seen: parking_lot::Mutex<Vec<usize>>,
    }

    impl Tracer for QueueReader {
        fn on_push(&self, owner: OwnerId, _task: TaskId, _queued: usize) {
            if let Some(d) = self.dispatcher.get() {
                self.seen.lock().push(d.queued(owner));
            }
        }
    }

    #[test]
    fn push_hook_may_read_the_queue() {
        let tracer = Arc::new(QueueReader {
            dispatcher: std::sync::OnceLock::new(),
            seen: parking_lot::Mutex::new(Vec::new()),
        });
        let d = Dispatcher::with_tracer(DispatcherConfig::default(), tracer.clone());
        let _ = tracer.dispatcher.set(d.clone());

        let owner = d.register_owner();
        d.handle_message(1u8, owner.id(), |_| {});
        d.handle_message(2u8, owner.id(), |_| {});

        assert_eq!(*tracer.seen.lock(), vec![0, 1]);
        assert_eq!(d.queued(owner.id()), 2);
    }
}
