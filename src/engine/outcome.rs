use std::sync::{Arc, Mutex};

use crate::accessor::Accessor;
use crate::activity::{Activity, lock, short_name};
use crate::collector::{ActivitySet, Labeled, Store};
use crate::engine::{Combinator, ResultData, State};
use crate::error::CollectorError;

type Predicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;
type DoneListener<S, F> = Box<dyn FnOnce(&ResultData<S, F>) + Send>;
type CancelListener = Box<dyn FnOnce() + Send>;

/// Why a node is about to cascade a cancellation, passed to
/// `Subtask::if_canceled`.
#[derive(Debug)]
pub enum Abort<'a, S, F> {
    /// The activity succeeded but `cancel_if` rejected its data.
    Errored(&'a S),
    /// The activity failed while being required.
    Failed(&'a F),
}

/// Per-node flags and predicates deciding whether a completion turns into
/// a cancellation cascade.
pub(crate) struct Policy<S, F> {
    pub(crate) required: bool,
    pub(crate) cancel_if: Option<Predicate<S>>,
    pub(crate) if_errored: Option<Predicate<S>>,
    pub(crate) if_failed: Option<Predicate<F>>,
}

impl<S, F> Default for Policy<S, F> {
    fn default() -> Self {
        Self {
            required: true,
            cancel_if: None,
            if_errored: None,
            if_failed: None,
        }
    }
}

impl<S, F> Policy<S, F> {
    /// A success is canceled when `cancel_if` holds; a failure is canceled
    /// when the node is required.
    fn should_cancel(&self, data: &ResultData<S, F>) -> bool {
        match data.state() {
            State::Success(s) => self.cancel_if.as_ref().is_some_and(|pred| pred(s)),
            State::Failure(_) => self.required,
            State::Pending => false,
        }
    }

    /// Absent predicates always propagate.
    fn should_propagate(&self, data: &ResultData<S, F>) -> bool {
        match data.state() {
            State::Success(s) => self.if_errored.as_ref().is_none_or(|pred| pred(s)),
            State::Failure(f) => self.if_failed.as_ref().is_none_or(|pred| pred(f)),
            State::Pending => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Done,
    Cancel,
}

struct Inner<A: Activity> {
    data: ResultData<A::Success, A::Failure>,
    policy: Policy<A::Success, A::Failure>,
    on_done: Vec<DoneListener<A::Success, A::Failure>>,
    on_cancel: Vec<CancelListener>,
    signal: Option<Signal>,
}

/// Result of one activity node: the data record, the cancellation policy
/// and the two listener lists notified when the node resolves.
pub(crate) struct Outcome<A: Activity> {
    name: &'static str,
    store: Arc<Store>,
    inner: Mutex<Inner<A>>,
}

impl<A: Activity> Outcome<A> {
    pub(crate) fn new(store: Arc<Store>, policy: Policy<A::Success, A::Failure>) -> Self {
        Self {
            name: short_name(std::any::type_name::<A>()),
            store,
            inner: Mutex::new(Inner {
                data: ResultData::default(),
                policy,
                on_done: Vec::new(),
                on_cancel: Vec::new(),
                signal: None,
            }),
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn snapshot(&self) -> ResultData<A::Success, A::Failure> {
        lock(&self.inner).data.clone()
    }

    /// Registers a downstream combinator as both completion and cancellation
    /// listener.
    pub(crate) fn listen(&self, combinator: &Arc<Combinator>) {
        let done = Arc::clone(combinator);
        let cancel = Arc::clone(combinator);
        self.subscribe(
            Box::new(move |_: &ResultData<A::Success, A::Failure>| done.signal()),
            Box::new(move || cancel.cancel()),
        );
    }

    /// Registers a pair of listeners. If the node already resolved, the
    /// matching listener runs immediately with the recorded outcome.
    pub(crate) fn subscribe(
        &self,
        on_done: DoneListener<A::Success, A::Failure>,
        on_cancel: CancelListener,
    ) {
        let replay = {
            let mut inner = lock(&self.inner);
            match inner.signal {
                None => {
                    inner.on_done.push(on_done);
                    inner.on_cancel.push(on_cancel);
                    return;
                }
                Some(signal) => (signal, inner.data.clone()),
            }
        };

        tracing::trace!(activity = self.name, "replaying outcome to late listener");

        match replay {
            (Signal::Done, data) => on_done(&data),
            (Signal::Cancel, _) => on_cancel(),
        }
    }

    /// Moves the node into its terminal state and runs the completion
    /// algorithm: decide, mark, store, notify.
    pub(crate) fn complete<F>(&self, transition: F)
    where
        F: FnOnce(&mut ResultData<A::Success, A::Failure>),
    {
        let (data, signal) = {
            let mut inner = lock(&self.inner);
            transition(&mut inner.data);

            let cancel = inner.policy.should_cancel(&inner.data);
            if cancel {
                inner.data.set_cancel();
            }

            let signal = if cancel && inner.policy.should_propagate(&inner.data) {
                Signal::Cancel
            } else {
                Signal::Done
            };

            (inner.data.clone(), signal)
        };

        let collector = self.store.name();
        match data.state() {
            State::Success(_) if data.canceled() => {
                tracing::debug!(
                    %collector,
                    activity = self.name,
                    "succeeded, canceled by predicate"
                );
            }
            State::Success(_) => {
                tracing::debug!(%collector, activity = self.name, "succeeded");
            }
            State::Failure(_) => {
                tracing::debug!(%collector, activity = self.name, "failed");
            }
            State::Pending => {}
        }

        self.resolve(data, signal);
    }

    /// Marks a node that will never start as canceled and continues the
    /// cascade below it.
    pub(crate) fn abandon(&self) {
        let data = {
            let mut inner = lock(&self.inner);
            inner.data.set_cancel();
            inner.data.clone()
        };

        tracing::debug!(collector = %self.store.name(), activity = self.name, "canceled");
        self.resolve(data, Signal::Cancel);
    }

    fn resolve(&self, data: ResultData<A::Success, A::Failure>, signal: Signal) {
        // Stored before anyone is notified, so downstream accessors observe
        // the data even in the middle of a cascade.
        if let Err(err) = self.store.insert(Labeled::<A>::new(data.clone())) {
            tracing::error!("{err}");
        }

        let (on_done, on_cancel) = {
            let mut inner = lock(&self.inner);
            inner.signal = Some(signal);
            (
                std::mem::take(&mut inner.on_done),
                std::mem::take(&mut inner.on_cancel),
            )
        };

        match signal {
            Signal::Done => on_done.into_iter().for_each(|listener| listener(&data)),
            Signal::Cancel => {
                tracing::trace!(
                    activity = self.name,
                    listeners = on_cancel.len(),
                    "propagating cancellation"
                );
                on_cancel.into_iter().for_each(|listener| listener());
            }
        }
    }
}

/// One-shot handle through which a running activity reports its result.
///
/// The handle is consumed by [`success`](Self::success),
/// [`failure`](Self::failure) or [`resolve`](Self::resolve), so an activity
/// cannot complete twice. Dropping it unresolved leaves every downstream node
/// waiting forever and is reported with a warning.
///
/// Until then it also gives the activity access to the collector it runs
/// in, through [`accessor`](Self::accessor) and [`context`](Self::context).
pub struct Completion<A: Activity> {
    outcome: Arc<Outcome<A>>,
    settled: bool,
}

impl<A: Activity> Completion<A> {
    pub(crate) fn new(outcome: Arc<Outcome<A>>) -> Self {
        Self {
            outcome,
            settled: false,
        }
    }

    /// Name of the collector this activity writes to.
    pub fn collector(&self) -> &str {
        self.outcome.store.name()
    }

    /// View over the results of `T` in the collector this activity runs in.
    pub fn accessor<T>(&self) -> Result<Accessor<T>, CollectorError>
    where
        T: ActivitySet,
    {
        Accessor::within(&self.outcome.store)
    }

    /// The execution context of the collector, if it is a `C`.
    pub fn context<C: Send + Sync + 'static>(&self) -> Option<&C> {
        self.outcome.store.context()
    }

    /// Completes the activity successfully.
    pub fn success(mut self, data: A::Success) {
        self.settled = true;
        self.outcome.complete(|record| record.set_success(data));
    }

    /// Completes the activity with a failure.
    pub fn failure(mut self, data: A::Failure) {
        self.settled = true;
        self.outcome.complete(|record| record.set_failure(data));
    }

    pub fn resolve(self, result: Result<A::Success, A::Failure>) {
        match result {
            Ok(data) => self.success(data),
            Err(data) => self.failure(data),
        }
    }
}

impl<A: Activity> Drop for Completion<A> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!(
                activity = self.outcome.name(),
                "completion dropped without success or failure, dependents will never run"
            );
        }
    }
}

impl<A: Activity> std::fmt::Debug for Completion<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Completion({})", short_name(std::any::type_name::<A>()))
    }
}
