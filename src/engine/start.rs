use std::sync::{Arc, Mutex};

use crate::accessor::Accessor;
use crate::activity::{ArcStr, lock};
use crate::blueprint::Kind;
use crate::collector::{ActivitySet, Collector};
use crate::engine::{Combinator, Dependency, Link};

#[derive(Default)]
struct Trigger {
    fired: bool,
    waiting: Vec<Arc<Combinator>>,
}

/// Root trigger of a graph, owning the collector the graph writes to.
///
/// Nodes wired `after(&start)` begin once [`run`](Self::run) is called.
///
/// ```rust
/// # use musubi::{Activity, Completion, after, start};
/// # struct Ping;
/// # impl Activity for Ping {
/// #     type Success = u32;
/// #     type Failure = ();
/// #     fn run(self, done: Completion<Self>) { done.success(1) }
/// # }
/// let root = start::<Ping, _>((), "ping");
/// let ping = after(&root).perform(root.collector(), Ping);
///
/// root.run();
/// assert_eq!(ping.result().success(), Some(&1));
/// ```
pub struct Start<S, C = ()> {
    collector: Collector<S, C>,
    trigger: Arc<Mutex<Trigger>>,
    link: Link,
}

/// Creates a [`Start`] together with a fresh collector for `S`.
pub fn start<S, C>(context: C, name: impl Into<ArcStr>) -> Start<S, C>
where
    S: ActivitySet,
    C: Send + Sync + 'static,
{
    Start::new(context, name)
}

impl<S, C> Start<S, C>
where
    S: ActivitySet,
    C: Send + Sync + 'static,
{
    pub fn new(context: C, name: impl Into<ArcStr>) -> Self {
        let collector = Collector::new(context, name);
        let link = collector.store().add_vertex("start", Kind::Start);

        Self {
            collector,
            trigger: Arc::new(Mutex::new(Trigger::default())),
            link,
        }
    }

    /// Signals every node waiting on this trigger.
    ///
    /// # Panics
    /// Panics if called more than once.
    pub fn run(&self) {
        let waiting = {
            let mut trigger = lock(&self.trigger);
            assert!(
                !trigger.fired,
                "start of '{}' ran more than once",
                self.collector.name()
            );
            trigger.fired = true;
            std::mem::take(&mut trigger.waiting)
        };

        tracing::debug!(
            collector = self.collector.name(),
            nodes = waiting.len(),
            "run"
        );

        for combinator in waiting {
            combinator.signal();
        }
    }

    pub fn collector(&self) -> &Collector<S, C> {
        &self.collector
    }

    pub fn accessor(&self) -> Accessor<S> {
        self.collector.accessor()
    }
}

impl<S, C> Dependency for Start<S, C> {
    fn listen(&self, combinator: &Arc<Combinator>) {
        {
            let mut trigger = lock(&self.trigger);
            if !trigger.fired {
                trigger.waiting.push(combinator.clone());
                return;
            }
        }

        combinator.signal();
    }

    fn link(&self) -> Link {
        self.link
    }
}

impl<S, C> Clone for Start<S, C> {
    fn clone(&self) -> Self {
        Self {
            collector: self.collector.clone(),
            trigger: self.trigger.clone(),
            link: self.link,
        }
    }
}

impl<S, C> std::fmt::Debug for Start<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Start")
            .field("collector", &self.collector)
            .field("fired", &lock(&self.trigger).fired)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Activity, Completion, after};

    struct Ping;

    impl Activity for Ping {
        type Success = u32;
        type Failure = ();

        fn run(self, done: Completion<Self>) {
            done.success(7);
        }
    }

    #[test]
    fn test_run_signals_waiting_nodes() {
        let root = start::<Ping, _>((), "root");
        let ping = after(&root).perform(root.collector(), Ping);
        assert!(!ping.result().completed());

        root.run();
        assert!(root.accessor().okay::<Ping>());
        assert_eq!(
            root.collector().blueprint().dependencies_of("Ping"),
            vec!["start"]
        );
    }

    #[test]
    fn test_wired_after_run() {
        let root = start::<Ping, _>((), "late");
        root.run();

        let ping = after(&root).perform(root.collector(), Ping);
        assert!(ping.result().okay());
    }

    #[test]
    #[should_panic(expected = "ran more than once")]
    fn test_run_twice_panics() {
        let root = start::<Ping, _>((), "twice");
        root.run();
        root.run();
    }
}
