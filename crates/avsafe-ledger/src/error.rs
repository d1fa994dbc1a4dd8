//! Error types for the ledger facade.

use avsafe_ledger_core::CoreError;
use avsafe_ledger_rules::RulesError;
use avsafe_ledger_store::StoreError;
use thiserror::Error;

/// Errors that can occur during ledger operations.
///
/// Verification outcomes are never errors; they come back as verdicts.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Canonicalization, chaining or signing failed.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Profile loading failed.
    #[error("rules error: {0}")]
    Rules(#[from] RulesError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
