//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A line of an NDJSON stream is not valid JSON.
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// A line parsed as JSON but is not a ledger record.
    #[error("line {line}: {reason}")]
    InvalidRecord { line: usize, reason: String },

    /// Record serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The appended record does not link to the current head of the chain.
    #[error("record for chain {chain_id} links to {got:?}, head is {head:?}")]
    NotHead {
        chain_id: String,
        head: Option<String>,
        got: Option<String>,
    },

    /// Chain ids become file names, so only a safe character set is allowed.
    #[error("invalid chain id: {0:?}")]
    InvalidChainId(String),

    /// A lock guarding store state was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}

impl StoreError {
    /// True for per-line damage that a reader can skip past.
    pub fn is_line_error(&self) -> bool {
        matches!(self, StoreError::Parse { .. } | StoreError::InvalidRecord { .. })
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
