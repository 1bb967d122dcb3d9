//! Error types for the aggregation layer.

use std::fmt;
use thiserror::Error;

/// The kind of remote resource a request was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// A course gradebook (the roster plus per-assessment scores).
    Gradebook,
    /// A course's assessment list.
    Assessments,
    /// The assessment instances (submissions) of one assessment.
    Submissions,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Gradebook => write!(f, "gradebook"),
            Resource::Assessments => write!(f, "assessments"),
            Resource::Submissions => write!(f, "submissions"),
        }
    }
}

/// Failures reported by a [`Transport`](crate::transport::Transport).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The server answered with a non-success status.
    #[error("HTTP status {0}")]
    Status(u16),

    /// The request never produced a response (connect, timeout, TLS).
    #[error("request failed: {0}")]
    Request(String),

    /// The response body was not valid JSON.
    #[error("invalid JSON body: {0}")]
    Body(String),
}

impl TransportError {
    /// Returns the HTTP status if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status(code) => Some(*code),
            _ => None,
        }
    }
}

/// Errors surfaced by entities, the aggregator and lookups.
#[derive(Error, Debug, Clone)]
pub enum PlError {
    /// A fetch against the grading API failed.
    #[error("failed to fetch {resource} for {id}: {source}")]
    FetchFailed {
        resource: Resource,
        /// Human-readable id of the thing being fetched, e.g. `course 1001`.
        id: String,
        #[source]
        source: TransportError,
    },

    /// The response arrived but did not have the expected shape.
    #[error("malformed {resource} response for {id}: {message}")]
    Decode {
        resource: Resource,
        id: String,
        message: String,
    },

    /// Statistics or a chart was requested over an empty data set.
    #[error("no data: {0}")]
    NoData(String),

    /// Conflicting or missing selectors.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl PlError {
    /// Returns the HTTP status carried by a fetch failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            PlError::FetchFailed { source, .. } => source.status(),
            _ => None,
        }
    }
}

/// Result type for aggregation operations.
pub type PlResult<T> = Result<T, PlError>;
