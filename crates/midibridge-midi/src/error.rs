//! Error types for event names, targets and property paths.

use thiserror::Error;

use crate::TargetType;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("event {event:?} is not supported on target type {target_type}")]
    UnsupportedEvent {
        target_type: TargetType,
        event: String,
    },

    #[error("event {event:?} has no property {property:?}")]
    UnsupportedProperty { event: String, property: String },

    #[error("target type {0} requires a target id")]
    MissingTargetId(TargetType),
}

pub type Result<T> = std::result::Result<T, Error>;
