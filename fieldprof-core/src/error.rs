//! Error types for profiling runs.
//!
//! Errors are contained at the smallest meaningful scope: a bad value is
//! counted, a bad field gets an `Error` entry, a bad correlation or rule is
//! reported inside its block. Only the conditions represented here escape a
//! run and abort it.

use thiserror::Error;

/// Main error type for fieldprof operations.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// The record source failed while being read
    #[error("Record source failed: {context}")]
    Source {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration or request validation error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Statistics could not be derived for a single field
    #[error("Finalization failed for field '{field}': {message}")]
    Finalization { field: String, message: String },

    /// The background worker terminated abnormally
    #[error("Profiling worker failed: {context}")]
    Worker { context: String },

    /// I/O operation failed
    #[error("I/O operation failed: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience type alias for Results with ProfileError
pub type Result<T> = std::result::Result<T, ProfileError>;

impl ProfileError {
    /// Creates a record source error for a malformed record
    ///
    /// # Arguments
    /// * `record` - Ordinal of the offending record in the source
    /// * `message` - What was wrong with it
    pub fn malformed_record(record: u64, message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::Source {
            context: format!("record {} is malformed", record),
            source: message.into(),
        }
    }

    /// Creates a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a per-field finalization error
    pub fn finalization(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Finalization {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a worker error
    pub fn worker(context: impl Into<String>) -> Self {
        Self::Worker {
            context: context.into(),
        }
    }

    /// Creates an I/O error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
