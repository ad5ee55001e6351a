//! Error taxonomy for thread reconstruction.
//!
//! An empty thread is not represented here: zero usable posts is a valid
//! input that produces a "no data" report.

use crate::models::AdapterKind;
use thiserror::Error;

/// Errors raised while resolving, fetching, or normalizing a thread.
#[derive(Debug, Error)]
pub enum ThreadError {
    /// The thread URL or id does not match the expected identifier pattern.
    #[error("invalid thread reference: {0}")]
    InvalidReference(String),

    /// A raw record has no usable id. The record is dropped and processing continues.
    #[error("malformed {adapter} record: {reason}")]
    MalformedRecord { adapter: AdapterKind, reason: String },

    /// A required external capability is missing for this adapter.
    #[error("{adapter} adapter unavailable: {reason}")]
    AdapterUnavailable { adapter: AdapterKind, reason: String },
}

impl ThreadError {
    pub fn malformed(adapter: AdapterKind, reason: impl Into<String>) -> Self {
        ThreadError::MalformedRecord {
            adapter,
            reason: reason.into(),
        }
    }

    pub fn unavailable(adapter: AdapterKind, reason: impl Into<String>) -> Self {
        ThreadError::AdapterUnavailable {
            adapter,
            reason: reason.into(),
        }
    }
}
