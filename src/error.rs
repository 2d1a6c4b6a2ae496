//! Error types for kbprep.

use thiserror::Error;

/// Result type for kbprep operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for kbprep operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A corpus record violates a structural invariant (mismatched parallel
    /// arrays, out-of-range span). The offending sentence is skipped.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// A candidate index is internally inconsistent.
    #[error("Index integrity violated: {0}")]
    Integrity(String),

    /// Lookup of an alias or entity that is not (or no longer) in the index.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A map-phase worker terminated abnormally.
    #[error("Worker failed on {input}: {reason}")]
    WorkerFailure {
        /// Identity of the input the worker was processing.
        input: String,
        /// Error message or panic payload.
        reason: String,
    },

    /// Per-file mention accounting did not add up.
    #[error("Reconciliation failed for {file}: seen {seen} != kept {kept} + dropped {dropped}")]
    Reconciliation {
        /// File whose counts disagree.
        file: String,
        /// Mentions read.
        seen: u64,
        /// Mentions written.
        kept: u64,
        /// Mentions removed.
        dropped: u64,
    },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML config parse error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Create a malformed record error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedRecord(msg.into())
    }

    /// Create an index integrity error.
    pub fn integrity(msg: impl Into<String>) -> Self {
        Error::Integrity(msg.into())
    }

    /// Create a not-found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Create a worker failure error.
    pub fn worker(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::WorkerFailure {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Whether this error must abort the whole run.
    ///
    /// Only malformed records are recoverable: the sentence is skipped and
    /// tallied. Everything else signals a logic error or lost data.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::MalformedRecord(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_is_the_only_recoverable_error() {
        assert!(!Error::malformed("x").is_fatal());
        assert!(Error::integrity("x").is_fatal());
        assert!(Error::not_found("x").is_fatal());
        assert!(Error::worker("a.jsonl", "boom").is_fatal());
        assert!(Error::Reconciliation {
            file: "a".into(),
            seen: 3,
            kept: 1,
            dropped: 1
        }
        .is_fatal());
    }

    #[test]
    fn reconciliation_message_names_counts() {
        let err = Error::Reconciliation {
            file: "part_0.jsonl".into(),
            seen: 5,
            kept: 3,
            dropped: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("part_0.jsonl"));
        assert!(msg.contains("seen 5"));
    }
}
