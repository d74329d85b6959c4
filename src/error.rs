use thiserror::Error;

use crate::activity::ArcStr;

/// Errors returned when the typed surface of a [`Collector`](crate::Collector)
/// or an [`Accessor`](crate::Accessor) is used with an activity it does not
/// know about.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollectorError {
    #[error("Activity '{activity}' is not declared in collector '{collector}'")]
    Undeclared {
        activity: &'static str,
        collector: ArcStr,
    },

    #[error("Activity '{activity}' is outside of this accessor's view of collector '{collector}'")]
    OutOfView {
        activity: &'static str,
        collector: ArcStr,
    },
}
