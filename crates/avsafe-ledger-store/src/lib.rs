//! # AV-SAFE Ledger Store
//!
//! Persistence for record streams. The ledger core never performs I/O;
//! this crate supplies the ordered record sequences it replays.
//!
//! ## Key Types
//!
//! - [`RecordStore`] - Sync trait over append-only chains keyed by chain id
//! - [`MemoryStore`] - In-memory chains for tests
//! - [`JsonlStore`] - One NDJSON file per chain
//! - [`jsonl::Lines`] - Line-by-line NDJSON reader that survives garbled lines
//!
//! ## Design Notes
//!
//! - **Linkage only**: `append` checks that `prev` names the current head.
//!   Hashes and signatures are checked by the verifier, not the store.
//! - **Idempotent appends**: re-appending the head returns `AlreadyHead`.
//! - **Damage stays visible**: [`RecordStore::entries`] hands back unreadable
//!   lines in place so a verifier can localize them.

pub mod error;
pub mod jsonl;
pub mod memory;
pub mod traits;

pub use error::{Result, StoreError};
pub use jsonl::{
    encode_line, read_entries, read_records, read_values, write_record, write_records, JsonlStore,
    Lines,
};
pub use memory::MemoryStore;
pub use traits::{AppendResult, Entry, RecordStore};
