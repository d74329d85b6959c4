#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Terminal state of an activity.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum State<S, F> {
    /// The activity has not completed (it may never have started).
    Pending,
    /// The activity completed successfully.
    Success(S),
    /// The activity completed with a failure.
    Failure(F),
}

/// Result record of a single activity.
///
/// A `ResultData` moves out of [`State::Pending`] exactly once, into either
/// [`State::Success`] or [`State::Failure`]. The `canceled` flag is
/// orthogonal: it is set on nodes that were abandoned before they started as
/// well as on nodes whose completion triggered a cancellation cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResultData<S, F> {
    state: State<S, F>,
    canceled: bool,
}

impl<S, F> Default for ResultData<S, F> {
    fn default() -> Self {
        Self {
            state: State::Pending,
            canceled: false,
        }
    }
}

impl<S, F> ResultData<S, F> {
    /// Creates a completed, successful record.
    pub fn succeeded(data: S) -> Self {
        Self {
            state: State::Success(data),
            canceled: false,
        }
    }

    /// Creates a completed, failed record.
    pub fn failed_with(data: F) -> Self {
        Self {
            state: State::Failure(data),
            canceled: false,
        }
    }

    pub fn state(&self) -> &State<S, F> {
        &self.state
    }

    /// Whether the activity reached success or failure.
    #[inline]
    pub fn completed(&self) -> bool {
        !matches!(self.state, State::Pending)
    }

    /// Whether the activity completed with a failure.
    #[inline]
    pub fn failed(&self) -> bool {
        matches!(self.state, State::Failure(_))
    }

    /// Whether the activity completed successfully.
    #[inline]
    pub fn okay(&self) -> bool {
        matches!(self.state, State::Success(_))
    }

    #[inline]
    pub fn canceled(&self) -> bool {
        self.canceled
    }

    /// Whether the activity succeeded but its success was turned into a
    /// cancellation (see `Subtask::cancel_if`).
    #[inline]
    pub fn errored(&self) -> bool {
        self.okay() && self.canceled
    }

    pub fn success(&self) -> Option<&S> {
        match &self.state {
            State::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&F> {
        match &self.state {
            State::Failure(data) => Some(data),
            _ => None,
        }
    }

    /// # Panics
    /// Panics if the record already left [`State::Pending`].
    pub(crate) fn set_success(&mut self, data: S) {
        assert!(
            !self.completed(),
            "activity completed more than once (success after {})",
            self.describe()
        );
        self.state = State::Success(data);
    }

    /// # Panics
    /// Panics if the record already left [`State::Pending`].
    pub(crate) fn set_failure(&mut self, data: F) {
        assert!(
            !self.completed(),
            "activity completed more than once (failure after {})",
            self.describe()
        );
        self.state = State::Failure(data);
    }

    pub(crate) fn set_cancel(&mut self) {
        self.canceled = true;
    }

    fn describe(&self) -> &'static str {
        match self.state {
            State::Pending => "pending",
            State::Success(_) => "success",
            State::Failure(_) => "failure",
        }
    }
}

impl<S, F> ResultData<S, F>
where
    S: Clone + Default,
    F: Clone + Default,
{
    /// Classifies the record into exactly one [`Resolution`].
    ///
    /// The checks run in a fixed order: a record that never completed is
    /// [`Resolution::Pending`] even if it was canceled; a completed and
    /// canceled record carries both payloads since cancellation may follow
    /// either a success or a failure.
    pub fn resolution(&self) -> Resolution<S, F> {
        match &self.state {
            State::Pending => Resolution::Pending,
            State::Success(s) if self.canceled => Resolution::Canceled(s.clone(), F::default()),
            State::Failure(f) if self.canceled => Resolution::Canceled(S::default(), f.clone()),
            State::Success(s) => Resolution::Success(s.clone()),
            State::Failure(f) => Resolution::Failure(f.clone()),
        }
    }

    /// Calls `fun` with the [`resolution`](Self::resolution) of this record.
    pub fn apply<R>(&self, fun: impl FnOnce(Resolution<S, F>) -> R) -> R {
        fun(self.resolution())
    }
}

/// The four shapes a result can take when it is inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<S, F> {
    /// Never completed.
    Pending,
    /// Completed successfully.
    Success(S),
    /// Completed with a failure.
    Failure(F),
    /// Completed and canceled. The payload that was never produced is
    /// default-constructed.
    Canceled(S, F),
}
