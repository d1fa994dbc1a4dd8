//! # AV-SAFE Ledger
//!
//! Tamper-evident, optionally signed chains of per-minute audio/visual
//! descriptor records, and the compliance evaluation of those records
//! against a rule profile.
//!
//! ## Overview
//!
//! - **Records**: a JSON payload plus a reserved `chain` block holding the
//!   record hash, the previous record's hash and an optional signature.
//! - **Chains**: each hash covers the previous hash and the canonical
//!   payload, so editing, reordering, inserting or dropping a record breaks
//!   every later link.
//! - **Verification**: a single pass reporting the first break and a
//!   per-record signature summary. A broken chain is a verdict, not an error.
//! - **Compliance**: noise and flicker statistics against a profile with
//!   locale-specific noise limits and a frequency-dependent flicker curve.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use avsafe_ledger::{Ledger, LedgerConfig};
//! use avsafe_ledger::rules::Profile;
//! use serde_json::json;
//!
//! fn example() -> avsafe_ledger::Result<()> {
//!     let ledger = Ledger::new(LedgerConfig::from_env()?);
//!
//!     let mut writer = ledger.writer();
//!     let mut records = Vec::new();
//!     for idx in 0..3 {
//!         records.push(writer.append_json(json!({
//!             "idx": idx,
//!             "device_id": "dev-1",
//!             "audio": {"laeq_db": 52.5},
//!         }))?);
//!     }
//!
//!     let report = ledger.audit(&records, &Profile::default(), Some("munich"));
//!     assert!(report.verification.ok);
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `avsafe_ledger::core` - canonical encoding, chaining, signatures, verification
//! - `avsafe_ledger::rules` - profiles and the compliance evaluator
//! - `avsafe_ledger::store` - NDJSON streams and record stores

pub mod config;
pub mod error;
pub mod ledger;
pub mod writer;

pub use avsafe_ledger_core as core;
pub use avsafe_ledger_rules as rules;
pub use avsafe_ledger_store as store;

pub use config::{LedgerConfig, Seed, SigningMode, ENV_PRIV_HEX, ENV_STRICT_CRYPTO};
pub use error::{LedgerError, Result};
pub use ledger::{AuditReport, Ledger, StoredVerdict};
pub use writer::ChainWriter;

pub use avsafe_ledger_core::{
    ChainVerdict, HashAlg, Object, Payload, Record, SigSummary, SignatureBackend,
    SignatureStatus, TrustedKeys, Value,
};
pub use avsafe_ledger_rules::{EvaluationResult, Profile};
pub use avsafe_ledger_store::{Entry, JsonlStore, MemoryStore, RecordStore};
