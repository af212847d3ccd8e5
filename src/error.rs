//! Error types
//!
//! Admission failures surface as [`GroupError`]; media parsing failures as
//! [`MediaError`]. Both fold into the crate-level [`Error`].

use thiserror::Error;

use crate::registry::StreamKey;

/// Result alias used by the media parsers
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-level error
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Group(#[from] GroupError),

    #[error(transparent)]
    Media(#[from] MediaError),
}

/// Error type for group admission
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupError {
    /// The group already has an input session feeding it
    #[error("in stream already exists at {stream}: add={incoming}, exist={existing}")]
    DuplicateProducer {
        stream: StreamKey,
        incoming: String,
        existing: String,
    },
}

/// Error type for media parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("invalid AAC packet")]
    InvalidAacPacket,

    #[error("invalid AVC packet")]
    InvalidAvcPacket,

    #[error("parameter set too short")]
    InvalidParameterSet,
}
