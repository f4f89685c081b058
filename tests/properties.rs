//! Property tests for delivery guarantees under arbitrary batch shapes.
//!
//! Case counts are kept small: every case spawns real threads.

use std::{
    cell::RefCell,
    rc::Rc,
    sync::{Arc, Mutex},
    thread,
};

use proptest::prelude::*;
use thread_dispatch::{BufferTracer, Dispatcher, DispatcherConfig};

fn quiet() -> Dispatcher {
    Dispatcher::with_tracer(DispatcherConfig::default(), Arc::new(BufferTracer::new()))
}

// ─── Spawned tasks ──────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Every run callback fires exactly once, whatever order the workers finish in.
    #[test]
    fn every_run_callback_fires_exactly_once(args in prop::collection::vec(0u32..10_000, 0..24)) {
        let d = quiet();
        let owner = d.register_owner();
        let seen = Rc::new(RefCell::new(Vec::new()));

        for &a in &args {
            let seen = seen.clone();
            owner
                .run(|x: u32| u64::from(x) * 2, move |v: u64| seen.borrow_mut().push(v), a)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
        }
        prop_assert_eq!(owner.outstanding(), args.len());
        owner.wait().map_err(|e| TestCaseError::fail(e.to_string()))?;

        let mut got = seen.borrow().clone();
        got.sort_unstable();
        let mut want: Vec<u64> = args.iter().map(|&a| u64::from(a) * 2).collect();
        want.sort_unstable();
        prop_assert_eq!(got, want);
        prop_assert_eq!(owner.outstanding(), 0);
    }

    /// A partial drain stops once the limit is reached and never loses the rest.
    #[test]
    fn partial_drain_respects_limit(total in 1usize..20, limit in 0usize..20) {
        let d = quiet();
        let owner = d.register_owner();
        let delivered = Rc::new(RefCell::new(0usize));

        for i in 0..total {
            let delivered = delivered.clone();
            owner
                .run(|n: usize| n, move |_| *delivered.borrow_mut() += 1, i)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
        }

        owner
            .wait_until(owner.outstanding_at_most(limit))
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert!(owner.outstanding() <= limit);
        prop_assert_eq!(*delivered.borrow() + owner.outstanding(), total);

        owner.wait().map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(*delivered.borrow(), total);
    }
}

// ─── Injected messages ──────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Messages injected from one thread are delivered in push order.
    #[test]
    fn injected_messages_keep_push_order(values in prop::collection::vec(any::<i64>(), 1..40)) {
        let d = quiet();
        let owner = d.register_owner();
        let log = Arc::new(Mutex::new(Vec::new()));

        for &v in &values {
            let log = log.clone();
            d.handle_message(v, owner.id(), move |v: i64| log.lock().unwrap().push(v));
        }
        owner.wait().map_err(|e| TestCaseError::fail(e.to_string()))?;

        let got = log.lock().unwrap().clone();
        prop_assert_eq!(got, values);
    }

    /// With several producers, each producer's own messages stay in order.
    #[test]
    fn each_producer_keeps_its_own_order(producers in 1usize..5, per_producer in 1usize..40) {
        let d = quiet();
        let owner = d.register_owner();
        owner.prepare();
        let log = Arc::new(Mutex::new(Vec::new()));
        let target = owner.id();

        let handles: Vec<_> = (0..producers)
            .map(|p| {
                let remote = d.clone();
                let log = log.clone();
                thread::spawn(move || {
                    for n in 0..per_producer {
                        let log = log.clone();
                        remote.handle_message((p, n), target, move |m: (usize, usize)| log.lock().unwrap().push(m));
                    }
                })
            })
            .collect();

        let total = producers * per_producer;
        owner
            .wait_until(|| log.lock().unwrap().len() == total)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        for h in handles {
            prop_assert!(h.join().is_ok());
        }

        let got = log.lock().unwrap().clone();
        for p in 0..producers {
            let seq: Vec<usize> = got.iter().filter(|(q, _)| *q == p).map(|&(_, n)| n).collect();
            prop_assert_eq!(seq, (0..per_producer).collect::<Vec<_>>());
        }
        prop_assert_eq!(owner.outstanding(), 0);
    }
}
