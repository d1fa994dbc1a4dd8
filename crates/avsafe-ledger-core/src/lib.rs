//! # AV-SAFE Ledger Core
//!
//! Pure primitives for the tamper-evident descriptor ledger: canonical
//! encoding, hash chaining, signatures and chain verification.
//!
//! This crate performs no I/O. Every function is a deterministic
//! computation over in-memory values.
//!
//! ## Key Types
//!
//! - [`Payload`] - One descriptor object, without the reserved `chain` key
//! - [`Record`] - A payload sealed with its [`ChainBlock`]
//! - [`Signer`] - Signs and verifies under a fixed [`SignatureBackend`]
//! - [`ChainVerdict`] - Result of replaying a record stream
//!
//! ## Domains
//!
//! Chain hashes are computed over [`CHAIN_DOMAIN`] and signatures over
//! [`SIGN_DOMAIN`], so neither can be replayed as the other.

pub mod canonical;
pub mod chain;
pub mod crypto;
pub mod error;
pub mod record;
pub mod signing;
pub mod value;
pub mod verify;

pub use canonical::{canonical_payload, canonical_string, canonicalize};
pub use chain::{chain_hash, make_record, make_signed_record, seal, CHAIN_DOMAIN};
pub use crypto::{Ed25519Signature, HashAlg, Keypair, PublicKey, DIGEST_LEN};
pub use error::{CoreError, Result};
pub use record::{ChainBlock, Payload, Record, SignatureBlock, SignatureScheme, CHAIN_KEY};
pub use signing::{signing_message, SignatureBackend, Signer, SignerConfig, SIGN_DOMAIN};
pub use value::{Object, Value};
pub use verify::{
    verify_chain, verify_values, ChainVerdict, ChainVerifier, SigSummary, SignatureStatus,
    TrustedKeys, VerifyOptions,
};
