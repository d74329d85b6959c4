use std::sync::Arc;

use crate::activity::{Activity, short_name};
use crate::engine::Abort;
use crate::engine::outcome::Policy;

pub(crate) type Preparator<A> = Box<dyn FnOnce(&mut A) + Send>;

/// An activity together with the configuration of the node it will become.
///
/// A setup is finished before it reaches [`After::perform`](crate::After::perform),
/// so a node is wired to its dependencies only once its preparators and
/// cancellation policy exist. Passing a bare activity to `perform` is the
/// same as passing `Setup::new(activity)`.
///
/// ```
/// use musubi::{Activity, Completion, Setup, after, collect, perform};
///
/// struct Fetch;
/// struct Parse(String);
///
/// impl Activity for Fetch {
///     type Success = String;
///     type Failure = ();
///     fn run(self, done: Completion<Self>) {
///         done.success("  body ".into());
///     }
/// }
///
/// impl Activity for Parse {
///     type Success = usize;
///     type Failure = ();
///     fn run(self, done: Completion<Self>) {
///         done.success(self.0.len());
///     }
/// }
///
/// let data = collect::<(Fetch, Parse), _>((), "doc");
/// let access = data.accessor();
///
/// let fetch = perform(&data, Fetch);
/// let parse = after(&fetch).perform(
///     &data,
///     Setup::new(Parse(String::new()))
///         .prepare(move |parse| parse.0 = access.success::<Fetch>().trim().into())
///         .cancel_if(|len| *len == 0),
/// );
///
/// fetch.start();
/// assert_eq!(parse.result().success(), Some(&4));
/// ```
#[must_use = "a setup does nothing until it is performed"]
pub struct Setup<A: Activity> {
    pub(crate) activity: A,
    pub(crate) preparators: Vec<Preparator<A>>,
    pub(crate) policy: Policy<A::Success, A::Failure>,
}

impl<A: Activity> Setup<A> {
    pub fn new(activity: A) -> Self {
        Self {
            activity,
            preparators: Vec::new(),
            policy: Policy::default(),
        }
    }

    /// Registers a callback adapting the activity right before it starts,
    /// usually from data gathered by earlier activities. Callbacks run in
    /// registration order.
    pub fn prepare<F>(mut self, fun: F) -> Self
    where
        F: FnOnce(&mut A) + Send + 'static,
    {
        self.preparators.push(Box::new(fun));
        self
    }

    /// Whether a failure of this activity cancels its dependents. Defaults
    /// to `true`.
    pub fn required(mut self, required: bool) -> Self {
        self.policy.required = required;
        self
    }

    /// Turns a success into a cancellation when `pred` holds for the
    /// produced data. The result stays a success and reads as
    /// [`errored`](crate::ResultData::errored).
    pub fn cancel_if<F>(mut self, pred: F) -> Self
    where
        F: Fn(&A::Success) -> bool + Send + Sync + 'static,
    {
        self.policy.cancel_if = Some(Box::new(pred));
        self
    }

    /// Decides whether a cancellation caused by [`cancel_if`](Self::cancel_if)
    /// is propagated downstream. When `pred` returns `false`, dependents are
    /// signaled as if the activity completed normally.
    pub fn if_errored<F>(mut self, pred: F) -> Self
    where
        F: Fn(&A::Success) -> bool + Send + Sync + 'static,
    {
        self.policy.if_errored = Some(Box::new(pred));
        self
    }

    /// Decides whether the cancellation caused by a required failure is
    /// propagated downstream.
    pub fn if_failed<F>(mut self, pred: F) -> Self
    where
        F: Fn(&A::Failure) -> bool + Send + Sync + 'static,
    {
        self.policy.if_failed = Some(Box::new(pred));
        self
    }

    /// Sets both [`if_errored`](Self::if_errored) and
    /// [`if_failed`](Self::if_failed) from a single predicate.
    pub fn if_canceled<F>(mut self, pred: F) -> Self
    where
        F: Fn(Abort<'_, A::Success, A::Failure>) -> bool + Send + Sync + 'static,
    {
        let errored = Arc::new(pred);
        let failed = errored.clone();
        self.policy.if_errored = Some(Box::new(move |s: &A::Success| errored(Abort::Errored(s))));
        self.policy.if_failed = Some(Box::new(move |f: &A::Failure| failed(Abort::Failed(f))));
        self
    }
}

impl<A: Activity> std::fmt::Debug for Setup<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Setup")
            .field("activity", &short_name(std::any::type_name::<A>()))
            .field("preparators", &self.preparators.len())
            .field("required", &self.policy.required)
            .finish()
    }
}

/// Anything [`After::perform`](crate::After::perform) accepts: a bare
/// activity or a finished [`Setup`].
pub trait IntoSetup {
    type Activity: Activity;

    fn into_setup(self) -> Setup<Self::Activity>;
}

impl<A: Activity> IntoSetup for A {
    type Activity = A;

    fn into_setup(self) -> Setup<A> {
        Setup::new(self)
    }
}

impl<A: Activity> IntoSetup for Setup<A> {
    type Activity = A;

    fn into_setup(self) -> Setup<A> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Completion;

    struct Noop;

    impl Activity for Noop {
        type Success = u8;
        type Failure = u8;

        fn run(self, done: Completion<Self>) {
            done.success(0);
        }
    }

    #[test]
    fn test_defaults() {
        let setup = Noop.into_setup();
        assert!(setup.policy.required);
        assert!(setup.policy.cancel_if.is_none());
        assert!(setup.preparators.is_empty());
    }

    #[test]
    fn test_if_canceled_sets_both_predicates() {
        let setup = Setup::new(Noop).if_canceled(|abort| matches!(abort, Abort::Failed(_)));

        let errored = setup.policy.if_errored.as_ref().unwrap();
        let failed = setup.policy.if_failed.as_ref().unwrap();
        assert!(!errored(&1));
        assert!(failed(&1));
    }

    #[test]
    fn test_builder_is_order_independent() {
        let first = Setup::new(Noop).required(false).cancel_if(|s| *s > 3);
        let second = Setup::new(Noop).cancel_if(|s| *s > 3).required(false);

        for setup in [first, second] {
            assert!(!setup.policy.required);
            let pred = setup.policy.cancel_if.as_ref().unwrap();
            assert!(pred(&4) && !pred(&3));
        }
    }
}
