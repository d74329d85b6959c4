mod after;
mod combinator;
mod data;
mod joined;
mod outcome;
mod setup;
mod start;
mod subtask;

use std::sync::Arc;

use petgraph::graph::NodeIndex;

pub use crate::engine::after::{After, after, perform};
pub use crate::engine::combinator::Combinator;
pub use crate::engine::data::{Resolution, ResultData, State};
pub use crate::engine::joined::Finished;
pub use crate::engine::outcome::{Abort, Completion};
pub use crate::engine::setup::{IntoSetup, Setup};
pub use crate::engine::start::{Start, start};
pub use crate::engine::subtask::Subtask;

pub(crate) use crate::engine::joined::Joined;
pub(crate) use crate::engine::outcome::Outcome;

/// The node gated by a [`Combinator`].
pub trait Next: Send + Sync {
    /// Every dependency completed.
    fn invoke(&self);
    /// Every dependency reported, at least one of them canceled.
    fn cancel(&self);
    /// Name used in diagnostics.
    fn name(&self) -> &'static str;
}

/// Position of a node in the blueprint of the collector that owns it.
#[doc(hidden)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub(crate) store: usize,
    pub(crate) index: NodeIndex,
}

/// Something a node can wait on.
pub trait Dependency {
    /// Registers `combinator` to be signaled once this dependency resolves.
    #[doc(hidden)]
    fn listen(&self, combinator: &Arc<Combinator>);

    #[doc(hidden)]
    fn link(&self) -> Link;
}

impl<D> Dependency for &D
where
    D: Dependency,
{
    fn listen(&self, combinator: &Arc<Combinator>) {
        Dependency::listen(*self, combinator)
    }

    fn link(&self) -> Link {
        Dependency::link(*self)
    }
}

/// A collection of [`Dependency`]s gating a single node.
///
/// This trait is implemented for tuples of dependencies, allowing them to be
/// passed to [`after`]. The order of the dependencies carries no meaning:
/// the gated node runs once all of them resolved, in whatever order that
/// happens.
pub trait Dependencies {
    /// Number of signals the gating combinator waits for.
    fn count(&self) -> usize;

    /// Registers `combinator` with every dependency in the collection.
    fn listen(&self, combinator: &Arc<Combinator>);

    /// Blueprint positions of the dependencies.
    fn links(&self) -> Vec<Link>;
}

impl Dependencies for () {
    fn count(&self) -> usize {
        0
    }

    fn listen(&self, _: &Arc<Combinator>) {}

    fn links(&self) -> Vec<Link> {
        vec![]
    }
}

impl<D> Dependencies for D
where
    D: Dependency,
{
    fn count(&self) -> usize {
        1
    }

    fn listen(&self, combinator: &Arc<Combinator>) {
        Dependency::listen(self, combinator)
    }

    fn links(&self) -> Vec<Link> {
        vec![Dependency::link(self)]
    }
}

impl<D> Dependencies for Vec<D>
where
    D: Dependency,
{
    fn count(&self) -> usize {
        self.len()
    }

    fn listen(&self, combinator: &Arc<Combinator>) {
        for dep in self {
            Dependency::listen(dep, combinator);
        }
    }

    fn links(&self) -> Vec<Link> {
        self.iter().map(Dependency::link).collect()
    }
}

macro_rules! impl_deps {
    ($($D:ident),*) => {
        #[allow(non_snake_case)]
        impl<$($D),*> Dependencies for ($($D,)*)
        where
            $($D: Dependency),* {
            fn count(&self) -> usize {
                [$(stringify!($D),)*].len()
            }

            fn listen(&self, combinator: &Arc<Combinator>) {
                let ($($D,)*) = self;
                $(Dependency::listen($D, combinator);)*
            }

            fn links(&self) -> Vec<Link> {
                let ($($D,)*) = self;
                vec![$(Dependency::link($D),)*]
            }
        }
    };
}

impl_deps!(A);
impl_deps!(A, B);
impl_deps!(A, B, C);
impl_deps!(A, B, C, D);
impl_deps!(A, B, C, D, E);
impl_deps!(A, B, C, D, E, F);
impl_deps!(A, B, C, D, E, F, G);
impl_deps!(A, B, C, D, E, F, G, H);
impl_deps!(A, B, C, D, E, F, G, H, I);
impl_deps!(A, B, C, D, E, F, G, H, I, J);
impl_deps!(A, B, C, D, E, F, G, H, I, J, K);
impl_deps!(A, B, C, D, E, F, G, H, I, J, K, L);
