//! # THREAD-DISPATCH
//! Fire work onto native threads, keep going, then drain the results back
//! on the thread that asked for them.
//!
//! An [`Owner`] runs tasks with [`Owner::run`]; each task gets its own
//! thread and its result lands in the owner's message queue. Nothing runs
//! on the owner's side until it enters a drain loop ([`Owner::wait`],
//! [`Owner::wait_until`]), which pops results in arrival order and invokes
//! each task's callback on the owner thread. Other threads can feed the
//! same loop with [`Dispatcher::handle_message`].
//!
//! ```no_run
//! use thread_dispatch::Dispatcher;
//!
//! let dispatcher = Dispatcher::new();
//! let owner = dispatcher.register_owner();
//!
//! owner.run(|x: String| x + " done", |r: String| println!("{r}"), "test".to_string())?;
//! owner.run(|x: String| x + " done", |r: String| println!("{r}"), "3".to_string())?;
//!
//! // returns once both callbacks have printed
//! owner.wait()?;
//! # Ok::<(), thread_dispatch::AsyncQueueError>(())
//! ```
//!
//! ## Principles
//! * **Delivered, not finished:** a task stays outstanding until its callback
//!   has run, so "nothing outstanding" never races a result still in the queue.
//! * **Owner affinity:** callbacks only ever run on the owner thread; [`Owner`]
//!   is `!Send`.
//! * **Re-entrant draining:** queue and registry outlive each `wait*` call;
//!   drain a little now, the rest later, under any [`FinishCondition`].
//! * **No silent loss:** a panicking or failing action is delivered as a
//!   [`TaskFailure`] through the same queue.

mod condition;
mod config;
mod dispatcher;
mod error;
mod interrupt;
mod owner;
mod queue;
mod registry;
mod task;
mod trace;

pub use condition::{AllDelivered, FinishCondition, OutstandingAtMost};
pub use config::{DispatcherConfig, FailurePolicy};
pub use dispatcher::Dispatcher;
pub use error::AsyncQueueError;
pub use interrupt::Interrupter;
pub use owner::Owner;
pub use registry::TaskRegistry;
pub use task::{FailureReason, OwnerId, TaskFailure, TaskId, TaskKind, TaskRecord};
pub use trace::{BufferTracer, LogTracer, Tracer};
