// src/main.rs
//
// Walks through the dispatcher's lifecycle:
//   RUST_LOG=thread_dispatch=debug cargo run --bin thread-dispatch-demo

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use thread_dispatch::{AsyncQueueError, Dispatcher, DispatcherConfig, FailurePolicy};
use tracing_subscriber::EnvFilter;

// Fake some work: sleep a little, longer for longer inputs.
fn slow_suffix(arg: String) -> String {
    let ms = 50 + 40 * (arg.len() as u64 % 5);
    println!("run from {:?}, waiting {ms}ms ...", thread::current().name());
    thread::sleep(Duration::from_millis(ms));
    arg + " done"
}

fn print_result(value: String) {
    println!("main from {:?}: {value}", thread::current().name());
}

/// Two tasks, one default wait.
fn two_tasks(dispatcher: &Dispatcher) -> Result<(), AsyncQueueError> {
    let owner = dispatcher.register_owner();

    owner.run(slow_suffix, print_result, "test".to_string())?;
    owner.run(slow_suffix, print_result, "3".to_string())?;
    owner.run(|n: u64| format!("{n} is an awesome number"), print_result, 777)?;

    owner.wait()?;
    println!("all runnables finished");
    Ok(())
}

/// Another thread hands a value to this thread's drain loop.
fn injected_ping(dispatcher: &Dispatcher) -> Result<(), AsyncQueueError> {
    let owner = dispatcher.register_owner();
    owner.prepare();

    let received = Arc::new(AtomicBool::new(false));
    let flag = received.clone();
    let target = owner.id();
    let remote = dispatcher.clone();
    let sender = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        remote.handle_message("generic thread test".to_string(), target, move |value: String| {
            print_result(value);
            flag.store(true, Ordering::SeqCst);
        });
    });

    // nothing is registered until the sender runs, so wait on its signal
    owner.wait_until(|| received.load(Ordering::SeqCst))?;
    if sender.join().is_err() {
        eprintln!("sender thread panicked");
    }

    println!("all external threads finished");
    Ok(())
}

/// Drain part of a batch, do something else, drain the rest.
fn drain_in_stages(dispatcher: &Dispatcher) -> Result<(), AsyncQueueError> {
    let owner = dispatcher.register_owner();
    for i in 0..6u64 {
        owner.run(
            move |n: u64| {
                thread::sleep(Duration::from_millis(10 * n));
                n * n
            },
            |sq: u64| println!("square: {sq}"),
            i,
        )?;
    }

    owner.wait_until(owner.outstanding_at_most(3))?;
    println!("half way, {} still outstanding", owner.outstanding());
    owner.wait()?;
    println!("batch drained");
    Ok(())
}

/// Failures come back through the queue instead of hanging the wait.
fn failures(dispatcher: &Dispatcher) -> Result<(), AsyncQueueError> {
    let owner = dispatcher.register_owner();
    owner.on_failure(|failure| println!("failure handler: {failure}"));

    owner.run(|_: ()| -> u32 { panic!("intentional panic") }, |_| {}, ())?;
    owner.try_run(|path: &'static str| std::fs::read_to_string(path), print_result, "/definitely/missing")?;

    owner.wait()?;
    Ok(())
}

fn main() -> Result<(), AsyncQueueError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let dispatcher = Dispatcher::with_config(DispatcherConfig::default().with_thread_name_prefix("demo"));

    println!("=== two tasks ===");
    two_tasks(&dispatcher)?;

    println!("\n=== injected message ===");
    injected_ping(&dispatcher)?;

    println!("\n=== staged drain ===");
    drain_in_stages(&dispatcher)?;

    println!("\n=== failures ===");
    failures(&dispatcher)?;

    println!("\n=== propagated failure ===");
    let strict = Dispatcher::with_config(DispatcherConfig::default().with_failure_policy(FailurePolicy::Propagate));
    let owner = strict.register_owner();
    owner.try_run(|_: ()| Err::<(), _>("refused"), |_| {}, ())?;
    match owner.wait() {
        Err(AsyncQueueError::TaskFailed(f)) => println!("wait returned: {f}"),
        other => println!("unexpected: {other:?}"),
    }

    Ok(())
}
