use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::sleep;

use crate::activity::Activity;
use crate::engine::Completion;

/// Failure of a [`Deadline`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Elapsed {
    pub after: Duration,
}

impl std::fmt::Display for Elapsed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "deadline elapsed after {:?}", self.after)
    }
}

/// Activity failing once a timer on the given runtime fires.
///
/// A graph waiting on both a deadline and some real work proceeds once the
/// slower of the two resolves; with the deadline required, its failure
/// cancels every node wired after it.
#[derive(Debug, Clone)]
pub struct Deadline {
    handle: Handle,
    after: Duration,
}

impl Deadline {
    pub fn new(handle: Handle, after: Duration) -> Self {
        Self { handle, after }
    }

    /// A deadline on the runtime the caller runs in.
    ///
    /// # Panics
    /// Panics when called outside of a tokio runtime.
    pub fn current(after: Duration) -> Self {
        Self::new(Handle::current(), after)
    }
}

impl Activity for Deadline {
    type Success = ();
    type Failure = Elapsed;

    fn run(self, done: Completion<Self>) {
        let after = self.after;
        self.handle.spawn(async move {
            sleep(after).await;
            tracing::debug!(?after, "deadline elapsed");
            done.failure(Elapsed { after });
        });
    }
}
