use std::any::{Any, TypeId};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::engine::Completion;

/// A type-erased, thread-safe container.
pub(crate) type Dynamic = Arc<dyn Any + Send + Sync>;

/// Atomic reference-counted string type used for identifiers.
pub type ArcStr = Arc<str>;

/// A unit of asynchronous work producing exactly one success or failure.
///
/// An activity is started by the engine once all of its dependencies have
/// reached a final state. Starting it hands over a [`Completion`] which the
/// activity must eventually resolve, usually from inside some callback of the
/// surrounding I/O reactor (a timer, a socket read, a database reply).
///
/// # Example
///
/// ```rust
/// use musubi::{Activity, Completion};
///
/// #[derive(Clone, Default)]
/// struct Answer(u32);
///
/// struct Ask;
///
/// impl Activity for Ask {
///     type Success = Answer;
///     type Failure = ();
///
///     fn run(self, done: Completion<Self>) {
///         done.success(Answer(42));
///     }
/// }
/// ```
pub trait Activity: Send + Sized + 'static {
    /// Data produced when the activity succeeds.
    type Success: Clone + Default + Send + Sync + 'static;
    /// Data produced when the activity fails.
    type Failure: Clone + Default + Send + Sync + 'static;

    /// Starts the activity. Exactly one of [`Completion::success`] or
    /// [`Completion::failure`] has to be called eventually, otherwise every
    /// node downstream of this one stalls.
    fn run(self, done: Completion<Self>);
}

/// Stable identity of an activity type, used as the storage key.
#[derive(Debug, Clone, Copy)]
pub struct ActivityId {
    id: TypeId,
    name: &'static str,
}

impl ActivityId {
    pub fn of<A: 'static>() -> Self {
        Self {
            id: TypeId::of::<A>(),
            name: std::any::type_name::<A>(),
        }
    }

    /// Fully qualified type name of the activity.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ActivityId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ActivityId {}

impl Hash for ActivityId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Type name without the module path, used in logs and diagrams.
pub(crate) fn short_name(name: &'static str) -> &'static str {
    let base = name.split('<').next().unwrap_or(name);
    base.rfind("::").map_or(base, |at| &base[at + 2..])
}

// A panic inside user code must not wedge the rest of the graph, so poisoned
// locks are recovered rather than propagated.

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
