use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::activity::{Activity, ActivityId};
use crate::collector::{ActivitySet, Collector, Labeled, Store};
use crate::engine::Resolution;
use crate::error::CollectorError;

/// Typed view over a subset `T` of a collector's activities.
///
/// An accessor shares the collector's storage, so it observes results
/// written after it was created. Reads of an activity that never completed,
/// or that lies outside the view, yield a pending record rather than an
/// error.
pub struct Accessor<T> {
    store: Arc<Store>,
    view: Arc<HashSet<ActivityId>>,
    _view: PhantomData<fn() -> T>,
}

impl<T> Accessor<T>
where
    T: ActivitySet,
{
    pub(crate) fn over(store: Arc<Store>, ids: Vec<ActivityId>) -> Self {
        Self {
            store,
            view: Arc::new(ids.into_iter().collect()),
            _view: PhantomData,
        }
    }

    /// Creates a view of `collector` restricted to `T`.
    pub fn new<S, C>(collector: &Collector<S, C>) -> Result<Self, CollectorError>
    where
        S: ActivitySet,
        C: Send + Sync + 'static,
    {
        Self::within(collector.store())
    }

    pub(crate) fn within(store: &Arc<Store>) -> Result<Self, CollectorError> {
        if let Some(id) = T::activities().into_iter().find(|id| !store.is_declared(id)) {
            return Err(store.undeclared(id));
        }

        Ok(Self::over(store.clone(), T::activities()))
    }

    /// Narrows this view further, to `U`.
    pub fn narrow<U>(&self) -> Result<Accessor<U>, CollectorError>
    where
        U: ActivitySet,
    {
        if let Some(id) = U::activities().into_iter().find(|id| !self.view.contains(id)) {
            return Err(self.out_of_view(id));
        }

        Ok(Accessor::over(self.store.clone(), U::activities()))
    }

    pub fn name(&self) -> &str {
        self.store.name()
    }

    /// Whether `V` is part of this view.
    pub fn contains<V: Activity>(&self) -> bool {
        self.view.contains(&ActivityId::of::<V>())
    }

    /// Whether a result for `V` was written.
    pub fn exists<V: Activity>(&self) -> bool {
        self.read::<V>().is_some()
    }

    /// Labeled result of `V`.
    pub fn get<V: Activity>(&self) -> Labeled<V> {
        self.read::<V>().unwrap_or_default()
    }

    /// Overwrites the result of `V`.
    pub fn set<V: Activity>(&self, labeled: Labeled<V>) -> Result<(), CollectorError> {
        if !self.contains::<V>() {
            return Err(self.out_of_view(ActivityId::of::<V>()));
        }
        self.store.insert(labeled)
    }

    pub fn completed<V: Activity>(&self) -> bool {
        self.get::<V>().completed()
    }

    pub fn canceled<V: Activity>(&self) -> bool {
        self.get::<V>().canceled()
    }

    pub fn failed<V: Activity>(&self) -> bool {
        self.get::<V>().failed()
    }

    pub fn okay<V: Activity>(&self) -> bool {
        self.get::<V>().okay()
    }

    /// Success data of `V`, or its default when `V` did not succeed.
    pub fn success<V: Activity>(&self) -> V::Success {
        self.get::<V>().success().cloned().unwrap_or_default()
    }

    /// Failure data of `V`, or its default when `V` did not fail.
    pub fn failure<V: Activity>(&self) -> V::Failure {
        self.get::<V>().failure().cloned().unwrap_or_default()
    }

    /// Calls `fun` with the [`Resolution`] of `V`.
    ///
    /// ```rust
    /// # use musubi::{Activity, Completion, Resolution, collect, perform};
    /// # struct Lookup;
    /// # impl Activity for Lookup {
    /// #     type Success = u32;
    /// #     type Failure = String;
    /// #     fn run(self, done: Completion<Self>) { done.success(3) }
    /// # }
    /// let data = collect::<Lookup, _>((), "apply");
    /// perform(&data, Lookup).start();
    ///
    /// let text = data.accessor().apply::<Lookup, _>(|res| match res {
    ///     Resolution::Pending => "pending".to_string(),
    ///     Resolution::Success(n) => format!("found {n}"),
    ///     Resolution::Failure(why) => why,
    ///     Resolution::Canceled(..) => "canceled".to_string(),
    /// });
    /// assert_eq!(text, "found 3");
    /// ```
    pub fn apply<V, R>(&self, fun: impl FnOnce(Resolution<V::Success, V::Failure>) -> R) -> R
    where
        V: Activity,
    {
        self.get::<V>().apply(fun)
    }

    fn read<V: Activity>(&self) -> Option<Labeled<V>> {
        if !self.contains::<V>() {
            return None;
        }
        self.store.extract::<V>().ok().flatten()
    }

    fn out_of_view(&self, id: ActivityId) -> CollectorError {
        CollectorError::OutOfView {
            activity: id.name(),
            collector: self.store.name().clone(),
        }
    }
}

impl<T> Clone for Accessor<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            view: self.view.clone(),
            _view: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Accessor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut view: Vec<_> = self.view.iter().map(ActivityId::name).collect();
        view.sort_unstable();
        f.debug_struct("Accessor")
            .field("collector", self.store.name())
            .field("view", &view)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Completion, ResultData, collect};

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Rows(Vec<u32>);

    struct Select;
    struct Update;
    struct Audit;

    impl Activity for Select {
        type Success = Rows;
        type Failure = String;

        fn run(self, done: Completion<Self>) {
            done.success(Rows(vec![1, 2]));
        }
    }

    impl Activity for Update {
        type Success = usize;
        type Failure = String;

        fn run(self, done: Completion<Self>) {
            done.failure("locked".into());
        }
    }

    impl Activity for Audit {
        type Success = ();
        type Failure = ();

        fn run(self, done: Completion<Self>) {
            done.success(());
        }
    }

    #[test]
    fn test_missing_reads_are_defaults() {
        let data = collect::<(Select, Update), _>((), "defaults");
        let access = data.accessor();

        assert!(!access.exists::<Select>());
        assert!(!access.completed::<Select>());
        assert!(!access.failed::<Update>());
        assert_eq!(access.success::<Select>(), Rows::default());
        assert_eq!(access.failure::<Update>(), String::new());
        assert_eq!(access.apply::<Select, _>(|res| res), Resolution::Pending);
    }

    #[test]
    fn test_set_and_get() {
        let data = collect::<(Select, Update), _>((), "set");
        let access = data.accessor();

        let locked = Labeled::<Update>::new(ResultData::failed_with("locked".into()));
        access.set(locked).unwrap();

        assert!(access.exists::<Update>());
        assert!(access.failed::<Update>());
        assert!(!access.okay::<Update>());
        assert_eq!(access.failure::<Update>(), "locked");
        assert_eq!(data.extract::<Update>().unwrap(), access.get::<Update>());
    }

    #[test]
    fn test_new_rejects_undeclared() {
        let data = collect::<(Select, Update), _>((), "subset");

        assert!(Accessor::<Select>::new(&data).is_ok());
        let err = Accessor::<(Select, Audit)>::new(&data).unwrap_err();
        assert!(matches!(err, CollectorError::Undeclared { .. }));
    }

    #[test]
    fn test_narrow_limits_view() {
        let data = collect::<(Select, Update), _>((), "narrow");
        data.insert(Labeled::<Update>::new(ResultData::succeeded(3)))
            .unwrap();

        let wide = data.accessor();
        let narrow = wide.narrow::<Select>().unwrap();

        assert!(narrow.contains::<Select>());
        assert!(!narrow.contains::<Update>());
        assert!(!narrow.okay::<Update>());
        assert!(wide.okay::<Update>());

        let err = narrow
            .set(Labeled::<Update>::new(ResultData::succeeded(4)))
            .unwrap_err();
        assert!(matches!(err, CollectorError::OutOfView { .. }));
        assert!(narrow.narrow::<(Select, Update)>().is_err());
    }
}
