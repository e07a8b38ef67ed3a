//! # Engine Errors
//!
//! `NotFound` and `Store` failures travel back to whoever asked for the
//! attendance update. `DeliveryFailure` never leaves the push channel: it is
//! logged and the failing subscriber is dropped.

use thiserror::Error;

use crate::core::dispatcher::SubscriberId;
use crate::core::model::StudentId;

/// Failure of the persistence layer behind a store trait.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or rejected the command.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored document could not be decoded.
    #[error("malformed document for student {id}: {source}")]
    Malformed {
        /// Key of the offending document.
        id: String,
        /// The decoding error.
        #[source]
        source: serde_json::Error,
    },

    /// A document could not be encoded before writing.
    #[error("error encoding document: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failure while recording attendance for a single student id.
#[derive(Debug, Error)]
pub enum AttendanceError {
    /// No student document exists for the id.
    #[error("student {0} not found")]
    NotFound(StudentId),

    /// The store failed while reading or writing the document.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A write to a subscriber's sink failed because its receiving side is gone.
#[derive(Debug, Error)]
#[error("delivery to subscriber {subscriber} failed, receiver closed")]
pub struct DeliveryFailure {
    /// The subscriber that could not be reached.
    pub subscriber: SubscriberId,
}
