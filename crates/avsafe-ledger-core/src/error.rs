//! Error types for the AV-SAFE ledger core.
//!
//! Only creation-side defects are errors. Verification mismatches are
//! reported as verdicts and booleans, never through this type.

use thiserror::Error;

/// Core errors that can occur while canonicalizing, chaining or signing.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The value cannot be canonicalized (e.g. NaN or infinity).
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The payload already carries the reserved `chain` key.
    #[error("payload contains reserved key `{0}`")]
    ReservedKey(&'static str),

    /// A previous-hash link is present but is not valid hex.
    #[error("invalid previous hash: {0}")]
    InvalidPrevHash(String),

    /// A hex field (signature, public key, seed) failed to decode.
    #[error("invalid hex in {field}: {reason}")]
    InvalidHex { field: &'static str, reason: String },

    /// A signing seed has the wrong length.
    #[error("signing seed must be 32 or 64 bytes, got {0}")]
    InvalidSeed(usize),

    /// Strict mode forbids the demo fallback and no Ed25519 backend is configured.
    #[error("real cryptography required but no Ed25519 backend is available")]
    CryptoUnavailable,

    /// The bytes are not a valid Ed25519 public key.
    #[error("invalid public key")]
    InvalidPublicKey,

    /// The signature does not verify.
    #[error("invalid signature")]
    InvalidSignature,

    /// A parsed record does not have the shape of a ledger record.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// The record names a hash algorithm this build does not know.
    #[error("unknown hash algorithm: {0}")]
    UnknownHashAlg(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
