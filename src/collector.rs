use std::collections::HashMap;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::{Arc, Mutex, RwLock};

use petgraph::Graph;
use petgraph::graph::NodeIndex;

use crate::accessor::Accessor;
use crate::activity::{Activity, ActivityId, ArcStr, Dynamic, lock, read, write};
use crate::blueprint::{Blueprint, Kind, Vertex};
use crate::engine::{Link, ResultData};
use crate::error::CollectorError;

/// A [`ResultData`] labeled with the activity that produced it.
///
/// Two activities may well produce structurally identical payloads, so the
/// storage key is the activity type rather than the result type.
pub struct Labeled<A: Activity> {
    data: ResultData<A::Success, A::Failure>,
    _activity: PhantomData<fn() -> A>,
}

impl<A: Activity> Labeled<A> {
    pub fn new(data: ResultData<A::Success, A::Failure>) -> Self {
        Self {
            data,
            _activity: PhantomData,
        }
    }

    pub fn into_inner(self) -> ResultData<A::Success, A::Failure> {
        self.data
    }
}

impl<A: Activity> Deref for Labeled<A> {
    type Target = ResultData<A::Success, A::Failure>;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl<A: Activity> Default for Labeled<A> {
    fn default() -> Self {
        Self::new(ResultData::default())
    }
}

impl<A: Activity> Clone for Labeled<A> {
    fn clone(&self) -> Self {
        Self::new(self.data.clone())
    }
}

impl<A> PartialEq for Labeled<A>
where
    A: Activity,
    A::Success: PartialEq,
    A::Failure: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl<A> std::fmt::Debug for Labeled<A>
where
    A: Activity,
    A::Success: std::fmt::Debug,
    A::Failure: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Labeled").field(&self.data).finish()
    }
}

/// A closed set of activity types, declared up front for a collector or an
/// accessor.
///
/// Implemented for single activities and for tuples of up to twelve of them.
pub trait ActivitySet: 'static {
    fn activities() -> Vec<ActivityId>;
}

impl ActivitySet for () {
    fn activities() -> Vec<ActivityId> {
        vec![]
    }
}

impl<A> ActivitySet for A
where
    A: Activity,
{
    fn activities() -> Vec<ActivityId> {
        vec![ActivityId::of::<A>()]
    }
}

macro_rules! impl_set {
    ($($A:ident),*) => {
        impl<$($A),*> ActivitySet for ($($A,)*)
        where
            $($A: Activity),* {
            fn activities() -> Vec<ActivityId> {
                vec![$(ActivityId::of::<$A>(),)*]
            }
        }
    };
}

impl_set!(A);
impl_set!(A, B);
impl_set!(A, B, C);
impl_set!(A, B, C, D);
impl_set!(A, B, C, D, E);
impl_set!(A, B, C, D, E, F);
impl_set!(A, B, C, D, E, F, G);
impl_set!(A, B, C, D, E, F, G, H);
impl_set!(A, B, C, D, E, F, G, H, I);
impl_set!(A, B, C, D, E, F, G, H, I, J);
impl_set!(A, B, C, D, E, F, G, H, I, J, K);
impl_set!(A, B, C, D, E, F, G, H, I, J, K, L);

/// Type-erased backing storage shared by a collector, its accessors and
/// every node of the graph built over it.
pub(crate) struct Store {
    name: ArcStr,
    context: Dynamic,
    slots: RwLock<HashMap<ActivityId, Option<Dynamic>>>,
    graph: Mutex<Graph<Vertex, ()>>,
}

impl Store {
    fn new(name: ArcStr, context: Dynamic, declared: Vec<ActivityId>) -> Self {
        Self {
            name,
            context,
            slots: RwLock::new(declared.into_iter().map(|id| (id, None)).collect()),
            graph: Mutex::new(Graph::new()),
        }
    }

    pub(crate) fn name(&self) -> &ArcStr {
        &self.name
    }

    pub(crate) fn context<C: 'static>(&self) -> Option<&C> {
        self.context.downcast_ref()
    }

    pub(crate) fn is_declared(&self, id: &ActivityId) -> bool {
        read(&self.slots).contains_key(id)
    }

    pub(crate) fn undeclared(&self, id: ActivityId) -> CollectorError {
        CollectorError::Undeclared {
            activity: id.name(),
            collector: self.name.clone(),
        }
    }

    pub(crate) fn insert<A: Activity>(&self, labeled: Labeled<A>) -> Result<(), CollectorError> {
        let id = ActivityId::of::<A>();
        match write(&self.slots).get_mut(&id) {
            Some(slot) => {
                *slot = Some(Arc::new(labeled));
                Ok(())
            }
            None => Err(self.undeclared(id)),
        }
    }

    /// `Ok(None)` when the activity is declared but nothing was written yet.
    pub(crate) fn extract<A: Activity>(&self) -> Result<Option<Labeled<A>>, CollectorError> {
        let id = ActivityId::of::<A>();
        match read(&self.slots).get(&id) {
            Some(slot) => Ok(slot
                .as_ref()
                .and_then(|item| item.downcast_ref::<Labeled<A>>())
                .cloned()),
            None => Err(self.undeclared(id)),
        }
    }

    pub(crate) fn link(self: &Arc<Self>, index: NodeIndex) -> Link {
        Link {
            store: Arc::as_ptr(self) as usize,
            index,
        }
    }

    pub(crate) fn add_vertex(self: &Arc<Self>, name: &'static str, kind: Kind) -> Link {
        let index = lock(&self.graph).add_node(Vertex { name, kind });
        self.link(index)
    }

    /// Dependencies living in another collector are wired but not drawn.
    pub(crate) fn add_edge(self: &Arc<Self>, from: Link, to: Link) {
        let own = Arc::as_ptr(self) as usize;
        if from.store == own && to.store == own {
            lock(&self.graph).add_edge(from.index, to.index, ());
        }
    }

    fn blueprint(&self) -> Blueprint {
        Blueprint::new(self.name.clone(), lock(&self.graph).clone())
    }
}

/// Shared, named store holding one result slot per declared activity for a
/// single execution of an activity graph.
///
/// `S` is the declared [`ActivitySet`], `C` an opaque execution context
/// handed to whoever builds the graph. Cloning a collector is cheap; every
/// clone, accessor and graph node shares the same storage, which is released
/// with the last of them.
///
/// Collectors are independent of each other, so several graphs may run
/// concurrently without their results colliding.
pub struct Collector<S, C = ()> {
    store: Arc<Store>,
    context: Arc<C>,
    _set: PhantomData<fn() -> S>,
}

/// Creates a collector for the activity set `S`.
///
/// ```rust
/// # use musubi::{Activity, Completion, collect};
/// # #[derive(Clone, Default)] struct Row;
/// # struct Query;
/// # impl Activity for Query {
/// #     type Success = Row;
/// #     type Failure = ();
/// #     fn run(self, done: Completion<Self>) { done.success(Row) }
/// # }
/// let data = collect::<Query, _>((), "lookup");
/// assert_eq!(data.name(), "lookup");
/// assert!(!data.accessor().completed::<Query>());
/// ```
pub fn collect<S, C>(context: C, name: impl Into<ArcStr>) -> Collector<S, C>
where
    S: ActivitySet,
    C: Send + Sync + 'static,
{
    Collector::new(context, name)
}

impl<S, C> Collector<S, C>
where
    S: ActivitySet,
    C: Send + Sync + 'static,
{
    pub fn new(context: C, name: impl Into<ArcStr>) -> Self {
        let name = name.into();
        tracing::trace!(collector = %name, "collector created");

        let context = Arc::new(context);
        Self {
            store: Arc::new(Store::new(name, context.clone(), S::activities())),
            context,
            _set: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        self.store.name()
    }

    /// The execution context this collector was created with.
    pub fn context(&self) -> &C {
        &self.context
    }

    /// Stores a labeled result in the slot of activity `A`.
    pub fn insert<A: Activity>(&self, labeled: Labeled<A>) -> Result<(), CollectorError> {
        self.store.insert(labeled)
    }

    /// Reads the labeled result of activity `A`. A slot that was never
    /// written yields a pending record.
    pub fn extract<A: Activity>(&self) -> Result<Labeled<A>, CollectorError> {
        self.store.extract::<A>().map(Option::unwrap_or_default)
    }

    /// An accessor over every declared activity.
    pub fn accessor(&self) -> Accessor<S> {
        Accessor::over(self.store.clone(), S::activities())
    }

    /// Snapshot of the graph wired over this collector so far.
    pub fn blueprint(&self) -> Blueprint {
        self.store.blueprint()
    }

    pub(crate) fn store(&self) -> &Arc<Store> {
        &self.store
    }
}

impl<S, C> Clone for Collector<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            context: self.context.clone(),
            _set: PhantomData,
        }
    }
}

impl<S, C> std::fmt::Debug for Collector<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = read(&self.store.slots);
        let written = slots.values().filter(|slot| slot.is_some()).count();
        f.debug_struct("Collector")
            .field("name", &self.store.name)
            .field("declared", &slots.len())
            .field("written", &written)
            .finish()
    }
}
