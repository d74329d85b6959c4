use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::accessor::Accessor;
use crate::activity::lock;
use crate::collector::ActivitySet;
use crate::engine::Next;

type Callback<S> = Box<dyn FnOnce(&Accessor<S>) + Send>;

/// Terminal node running a host callback once every dependency reached a
/// final state, whether completed or canceled.
pub(crate) struct Joined<S> {
    accessor: Accessor<S>,
    callback: Mutex<Option<Callback<S>>>,
    fired: Arc<AtomicBool>,
}

impl<S: ActivitySet> Joined<S> {
    pub(crate) fn new(accessor: Accessor<S>, callback: Callback<S>) -> Self {
        Self {
            accessor,
            callback: Mutex::new(Some(callback)),
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn finished(&self) -> Finished {
        Finished {
            fired: self.fired.clone(),
        }
    }
}

impl<S: ActivitySet> Next for Joined<S> {
    fn invoke(&self) {
        let Some(callback) = lock(&self.callback).take() else {
            return;
        };

        tracing::debug!(collector = self.accessor.name(), "joined");
        callback(&self.accessor);
        self.fired.store(true, Ordering::Release);
    }

    fn cancel(&self) {
        self.invoke();
    }

    fn name(&self) -> &'static str {
        "joined"
    }
}

/// Handle to a terminal callback registered with
/// [`After::finish`](crate::After::finish).
#[derive(Debug, Clone)]
pub struct Finished {
    fired: Arc<AtomicBool>,
}

impl Finished {
    /// Whether the callback already ran.
    pub fn fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}
