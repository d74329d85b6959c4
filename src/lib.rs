#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod accessor;
mod activity;
mod blueprint;
mod collector;
#[cfg(feature = "tokio")]
mod deadline;
mod engine;
mod error;
#[cfg(feature = "logging")]
pub mod logging;

pub use crate::accessor::Accessor;
pub use crate::activity::{Activity, ActivityId, ArcStr};
pub use crate::blueprint::{Blueprint, Kind, Vertex};
pub use crate::collector::{ActivitySet, Collector, Labeled, collect};
#[cfg(feature = "tokio")]
pub use crate::deadline::{Deadline, Elapsed};
pub use crate::engine::{
    Abort, After, Combinator, Completion, Dependencies, Dependency, Finished, IntoSetup, Next,
    Resolution, ResultData, Setup, Start, State, Subtask, after, perform, start,
};
pub use crate::error::*;
