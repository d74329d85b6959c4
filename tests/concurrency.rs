//! Graphs whose activities complete on rayon worker threads.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use musubi::{Activity, Completion, Setup, Subtask, after, collect, start};

/// Completes on the rayon pool, failing when `fail` is set.
struct Work {
    value: u64,
    fail: bool,
}

/// Counts how many `Work` nodes ran to completion.
struct Tally(Arc<AtomicUsize>);

impl Activity for Work {
    type Success = u64;
    type Failure = String;

    fn run(self, done: Completion<Self>) {
        rayon::spawn(move || {
            if self.fail {
                done.failure(format!("work {} failed", self.value));
            } else {
                done.success(self.value * 2);
            }
        });
    }
}

impl Activity for Tally {
    type Success = usize;
    type Failure = ();

    fn run(self, done: Completion<Self>) {
        let seen = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        rayon::spawn(move || done.success(seen));
    }
}

const TIMEOUT: Duration = Duration::from_secs(10);

#[test]
fn test_wide_fan_in_on_pool() {
    let root = start::<(Work, Tally), _>((), "wide");
    let runs = Arc::new(AtomicUsize::new(0));

    let works: Vec<Subtask<Work>> = (0..64)
        .map(|value| {
            after(&root).perform(
                root.collector(),
                Work {
                    value,
                    fail: false,
                },
            )
        })
        .collect();

    let tally = after(works.clone()).perform(root.collector(), Tally(runs.clone()));

    let (tx, rx) = mpsc::channel();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    after(&tally).finish(root.collector(), move |access| {
        counter.fetch_add(1, Ordering::SeqCst);
        tx.send(access.success::<Tally>()).unwrap();
    });

    root.run();

    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), 1);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(works.iter().all(|work| work.result().okay()));
}

#[test]
fn test_failures_on_pool_cancel_once() {
    for round in 0..16 {
        let root = start::<(Work, Tally), _>((), format!("round-{round}"));
        let runs = Arc::new(AtomicUsize::new(0));

        let works: Vec<Subtask<Work>> = (0..32)
            .map(|value| {
                after(&root).perform(
                    root.collector(),
                    Work {
                        value,
                        fail: value % 7 == round % 7,
                    },
                )
            })
            .collect();

        let tally = after(works.clone()).perform(root.collector(), Tally(runs.clone()));

        let (tx, rx) = mpsc::channel();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        after(&tally).finish(root.collector(), move |access| {
            counter.fetch_add(1, Ordering::SeqCst);
            tx.send(access.canceled::<Tally>()).unwrap();
        });

        root.run();

        assert!(rx.recv_timeout(TIMEOUT).unwrap());
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(works.iter().any(|work| work.result().failed()));
        assert!(tally.result().canceled());
    }
}

/// Doubles the value left by `Work`, set by a preparator.
struct Relay(u64);

impl Activity for Relay {
    type Success = u64;
    type Failure = String;

    fn run(self, done: Completion<Self>) {
        done.success(self.0 * 2);
    }
}

#[test]
fn test_setup_holds_while_dependency_completes_on_pool() {
    for round in 0..200u64 {
        let data = collect::<(Work, Relay, Tally), _>((), format!("race-{round}"));
        let access = data.accessor();
        let runs = Arc::new(AtomicUsize::new(0));

        let work = musubi::perform(&data, Work { value: round, fail: false });
        work.start();

        let relay = after(&work).perform(
            &data,
            Setup::new(Relay(0))
                .prepare(move |relay| relay.0 = access.success::<Work>())
                .cancel_if(|_| true),
        );
        let tally = after(&relay).perform(&data, Tally(runs.clone()));

        let (tx, rx) = mpsc::channel();
        after(&tally).finish(&data, move |access| {
            tx.send(access.canceled::<Tally>()).unwrap();
        });

        assert!(rx.recv_timeout(TIMEOUT).unwrap(), "round {round}");
        assert_eq!(runs.load(Ordering::SeqCst), 0, "round {round}");
        assert_eq!(relay.result().success(), Some(&(round * 4)));
        assert!(relay.result().errored());
    }
}

#[test]
fn test_independent_graphs_in_parallel() {
    use rayon::prelude::*;

    let pending: Vec<_> = (0..32u64)
        .into_par_iter()
        .map(|value| {
            let data = collect::<Work, _>((), format!("graph-{value}"));
            let work = musubi::perform(&data, Work { value, fail: false });

            let (tx, rx) = mpsc::channel();
            after(&work).finish(&data, move |access| {
                tx.send(access.success::<Work>()).unwrap();
            });

            work.start();
            rx
        })
        .collect();

    let sums: Vec<u64> = pending
        .into_iter()
        .map(|rx| rx.recv_timeout(TIMEOUT).unwrap())
        .collect();

    assert_eq!(sums, (0..32u64).map(|value| value * 2).collect::<Vec<_>>());
}
