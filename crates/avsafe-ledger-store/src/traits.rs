//! Store trait: the interface for record stream persistence.
//!
//! A store holds any number of independent chains, each an append-only
//! sequence of records keyed by a chain id (one per device or session).

use avsafe_ledger_core::Record;

use crate::error::{Result, StoreError};

/// One stored line: a record, or the line error that stands in its place.
pub type Entry = Result<Record>;

/// Result of appending a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendResult {
    /// Record was appended (new head).
    Appended,
    /// The record is already the head of the chain (idempotent retry).
    AlreadyHead,
}

/// The record store trait.
///
/// Implementations only enforce linkage: an appended record must name the
/// current head as `prev`. Hash and signature checks belong to the verifier.
pub trait RecordStore: Send + Sync {
    /// Append a record to a chain.
    ///
    /// Fails with [`StoreError::NotHead`] if `record.chain.prev` is not the
    /// current head hash (`None` for an empty chain).
    fn append(&self, chain_id: &str, record: &Record) -> Result<AppendResult>;

    /// All records of a chain in order. Unknown chains are empty.
    ///
    /// Fails on the first entry that is not a record.
    fn records(&self, chain_id: &str) -> Result<Vec<Record>>;

    /// Every entry of a chain in order, damaged ones included.
    ///
    /// An entry that cannot be read as a record is a line error
    /// ([`StoreError::is_line_error`]) at its position. The outer result
    /// fails only when the chain itself cannot be read.
    fn entries(&self, chain_id: &str) -> Result<Vec<Entry>> {
        Ok(self.records(chain_id)?.into_iter().map(Ok).collect())
    }

    /// Ids of every chain holding at least one record, sorted.
    fn chain_ids(&self) -> Result<Vec<String>>;

    /// Hash of the last record in a chain.
    fn head(&self, chain_id: &str) -> Result<Option<String>>;

    /// Number of records in a chain.
    fn len(&self, chain_id: &str) -> Result<usize> {
        Ok(self.records(chain_id)?.len())
    }
}

/// Linkage check shared by implementations.
pub(crate) fn check_link(
    chain_id: &str,
    last: Option<&Record>,
    record: &Record,
) -> Result<AppendResult> {
    if last == Some(record) {
        return Ok(AppendResult::AlreadyHead);
    }
    let head = last.map(|r| r.hash());
    let got = record.chain().prev.as_deref();
    if head != got {
        return Err(StoreError::NotHead {
            chain_id: chain_id.to_owned(),
            head: head.map(str::to_owned),
            got: got.map(str::to_owned),
        });
    }
    Ok(AppendResult::Appended)
}
