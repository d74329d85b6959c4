use std::sync::{Arc, Mutex};

use crate::activity::{Activity, ActivityId, lock};
use crate::blueprint::Kind;
use crate::collector::Store;
use crate::engine::setup::Preparator;
use crate::engine::{
    Combinator, Completion, Dependencies, Dependency, Link, Next, Outcome, ResultData, Setup,
};

/// The activity instance waiting behind a combinator.
pub(crate) struct Task<A: Activity> {
    activity: Mutex<Option<A>>,
    preparators: Mutex<Vec<Preparator<A>>>,
    outcome: Arc<Outcome<A>>,
}

impl<A: Activity> Next for Task<A> {
    fn invoke(&self) {
        let Some(mut activity) = lock(&self.activity).take() else {
            panic!("'{}' started more than once", self.outcome.name());
        };

        let preparators = std::mem::take(&mut *lock(&self.preparators));
        for prepare in preparators {
            prepare(&mut activity);
        }

        tracing::debug!(activity = self.outcome.name(), "started");
        activity.run(Completion::new(self.outcome.clone()));
    }

    fn cancel(&self) {
        drop(lock(&self.activity).take());
        lock(&self.preparators).clear();
        self.outcome.abandon();
    }

    fn name(&self) -> &'static str {
        self.outcome.name()
    }
}

/// A node of the graph: one activity instance together with the combinator
/// gating its start.
///
/// Subtasks are built with [`After::perform`](crate::After::perform) or
/// [`perform`](crate::perform), from an activity or a [`Setup`] carrying its
/// configuration. The activity starts once every dependency completed; if
/// any of them was canceled the activity never starts, its result is marked
/// canceled and the cancellation continues downstream.
///
/// Cloning a subtask yields another handle to the same node.
pub struct Subtask<A: Activity> {
    task: Arc<Task<A>>,
    combinator: Arc<Combinator>,
    store: Arc<Store>,
    link: Link,
}

impl<A: Activity> Subtask<A> {
    /// # Panics
    /// Panics if `A` is not declared in the collector behind `store`.
    pub(crate) fn new<D>(store: &Arc<Store>, setup: Setup<A>, dependencies: &D) -> Self
    where
        D: Dependencies,
    {
        let id = ActivityId::of::<A>();
        if !store.is_declared(&id) {
            panic!("{}", store.undeclared(id));
        }

        let Setup {
            activity,
            preparators,
            policy,
        } = setup;

        let outcome = Arc::new(Outcome::<A>::new(store.clone(), policy));
        let link = store.add_vertex(outcome.name(), Kind::Activity);
        let task = Arc::new(Task {
            activity: Mutex::new(Some(activity)),
            preparators: Mutex::new(preparators),
            outcome,
        });

        let combinator = Combinator::new(task.clone(), dependencies.count());
        for from in dependencies.links() {
            store.add_edge(from, link);
        }

        let subtask = Self {
            task,
            combinator,
            store: store.clone(),
            link,
        };

        // Configuration is complete at this point. May start the activity
        // right away when every dependency has already resolved.
        dependencies.listen(&subtask.combinator);
        subtask
    }

    /// Starts a subtask that has no dependencies.
    ///
    /// # Panics
    /// Panics if the subtask has dependencies or was already started.
    pub fn start(&self) {
        self.combinator.open();
    }

    /// Adds one more dependency to this subtask.
    ///
    /// # Panics
    /// Panics if this subtask already started or was canceled.
    pub fn after<D>(&self, dependency: &D) -> &Self
    where
        D: Dependency,
    {
        self.combinator.expect();
        self.store.add_edge(dependency.link(), self.link);
        Dependency::listen(dependency, &self.combinator);
        self
    }

    /// Makes `next` wait for this subtask. Mirror of [`after`](Self::after).
    pub fn done<B: Activity>(&self, next: &Subtask<B>) -> &Self {
        next.after(self);
        self
    }

    /// Current result of this node.
    pub fn result(&self) -> ResultData<A::Success, A::Failure> {
        self.task.outcome.snapshot()
    }

    pub fn name(&self) -> &'static str {
        self.task.outcome.name()
    }
}

impl<A: Activity> Dependency for Subtask<A> {
    fn listen(&self, combinator: &Arc<Combinator>) {
        self.task.outcome.listen(combinator);
    }

    fn link(&self) -> Link {
        self.link
    }
}

impl<A: Activity> Clone for Subtask<A> {
    fn clone(&self) -> Self {
        Self {
            task: self.task.clone(),
            combinator: self.combinator.clone(),
            store: self.store.clone(),
            link: self.link,
        }
    }
}

impl<A: Activity> std::fmt::Debug for Subtask<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subtask")
            .field("activity", &self.name())
            .field("collector", self.store.name())
            .field("combinator", &self.combinator)
            .finish()
    }
}
