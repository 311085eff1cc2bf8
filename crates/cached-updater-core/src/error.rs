//! Error types shared by the caches.
//!
//! A cache miss is not an error: lookups on [`crate::DualKeyCache`] return
//! `None`, and the decorators sitting on top treat that as a signal to go
//! upstream. The types here cover what a producer can report and what a
//! caller sees when it asks for a hard result out of a [`crate::Snapshot`].

use std::sync::Arc;

/// Failure reported by a [`crate::Producer`].
#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    /// The upstream answered, but with a failure.
    #[error("Upstream error: {message}")]
    Upstream {
        /// Description of the upstream failure.
        message: String,
    },

    /// The upstream did not answer in time.
    #[error("Upstream timed out after {elapsed_ms} ms")]
    Timeout {
        /// How long the call ran before giving up.
        elapsed_ms: u64,
    },

    /// The upstream answer could not be decoded.
    #[error("Invalid upstream payload: {message}")]
    Decode {
        /// Description of the decoding failure.
        message: String,
    },

    /// Any other failure raised by a producer implementation.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ProducerError {
    /// Creates an upstream error from anything displayable.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    /// Creates a decode error from anything displayable.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }
}

/// Error returned when a snapshot is turned into a `Result`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// The producer reported a failure. The error is shared with the
    /// snapshot it came from, so the same failure can be replayed to many readers.
    #[error(transparent)]
    Producer(Arc<ProducerError>),

    /// The producer returned neither a value nor an error.
    #[error("Producer returned no value")]
    Empty,
}

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
