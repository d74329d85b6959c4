use std::sync::Arc;

use crate::accessor::Accessor;
use crate::blueprint::Kind;
use crate::collector::{ActivitySet, Collector};
use crate::engine::{Combinator, Dependencies, Finished, IntoSetup, Joined, Subtask};

/// Binder returned by [`after`], building nodes gated by a set of
/// dependencies.
#[derive(Debug, Clone)]
pub struct After<D> {
    dependencies: D,
}

/// Binds the dependencies for the next node of a graph.
///
/// Accepts a single [`Subtask`] or [`Start`](crate::Start) (by value or by
/// reference), a `Vec` of them, a tuple of up to twelve, or `()` for none.
pub fn after<D>(dependencies: D) -> After<D>
where
    D: Dependencies,
{
    After { dependencies }
}

/// Builds a root subtask with no dependencies. It runs once
/// [`Subtask::start`] is called.
pub fn perform<T, S, C>(collector: &Collector<S, C>, activity: T) -> Subtask<T::Activity>
where
    T: IntoSetup,
    S: ActivitySet,
    C: Send + Sync + 'static,
{
    after(()).perform(collector, activity)
}

impl<D> After<D>
where
    D: Dependencies,
{
    /// Builds a subtask running `activity` once every dependency completed.
    ///
    /// `activity` is either a bare [`Activity`](crate::Activity) or a
    /// [`Setup`](crate::Setup). The node is wired with its configuration
    /// already in place, so it may run before this call returns.
    ///
    /// # Panics
    /// Panics if the activity is not declared in `collector`.
    pub fn perform<T, S, C>(&self, collector: &Collector<S, C>, activity: T) -> Subtask<T::Activity>
    where
        T: IntoSetup,
        S: ActivitySet,
        C: Send + Sync + 'static,
    {
        Subtask::new(collector.store(), activity.into_setup(), &self.dependencies)
    }

    /// Registers the terminal callback of a graph.
    ///
    /// The callback runs exactly once, after every dependency reached a
    /// final state, completed or canceled. It receives an accessor over the
    /// whole collector. With no dependencies it runs right away.
    pub fn finish<S, C, F>(&self, collector: &Collector<S, C>, callback: F) -> Finished
    where
        S: ActivitySet,
        C: Send + Sync + 'static,
        F: FnOnce(&Accessor<S>) + Send + 'static,
    {
        let store = collector.store();
        let joined = Arc::new(Joined::new(collector.accessor(), Box::new(callback)));
        let finished = joined.finished();

        let link = store.add_vertex("joined", Kind::Joined);
        for from in self.dependencies.links() {
            store.add_edge(from, link);
        }

        let count = self.dependencies.count();
        let combinator = Combinator::new(joined, count);
        self.dependencies.listen(&combinator);

        if count == 0 {
            combinator.open();
        }

        finished
    }
}
