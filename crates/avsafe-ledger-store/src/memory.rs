//! In-memory implementation of the RecordStore trait.
//!
//! Primarily for tests and short-lived pipelines. Same linkage semantics
//! as the file store, nothing persisted.

use std::collections::HashMap;
use std::sync::RwLock;

use avsafe_ledger_core::Record;

use crate::error::{Result, StoreError};
use crate::traits::{check_link, AppendResult, RecordStore};

/// In-memory store. Thread-safe via RwLock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    chains: RwLock<HashMap<String, Vec<Record>>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn append(&self, chain_id: &str, record: &Record) -> Result<AppendResult> {
        let mut chains = self.chains.write().map_err(|_| StoreError::Poisoned)?;
        let chain = chains.entry(chain_id.to_owned()).or_default();
        let result = check_link(chain_id, chain.last(), record)?;
        if result == AppendResult::Appended {
            chain.push(record.clone());
        }
        Ok(result)
    }

    fn records(&self, chain_id: &str) -> Result<Vec<Record>> {
        let chains = self.chains.read().map_err(|_| StoreError::Poisoned)?;
        Ok(chains.get(chain_id).cloned().unwrap_or_default())
    }

    fn chain_ids(&self) -> Result<Vec<String>> {
        let chains = self.chains.read().map_err(|_| StoreError::Poisoned)?;
        let mut ids: Vec<String> = chains
            .iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn head(&self, chain_id: &str) -> Result<Option<String>> {
        let chains = self.chains.read().map_err(|_| StoreError::Poisoned)?;
        Ok(chains
            .get(chain_id)
            .and_then(|records| records.last())
            .map(|r| r.hash().to_owned()))
    }

    fn len(&self, chain_id: &str) -> Result<usize> {
        let chains = self.chains.read().map_err(|_| StoreError::Poisoned)?;
        Ok(chains.get(chain_id).map_or(0, Vec::len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avsafe_ledger_core::{make_record, HashAlg, Object, Value};

    fn minute(idx: i64, prev: Option<&str>) -> Record {
        let mut obj = Object::new();
        obj.insert("idx".into(), Value::Int(idx));
        make_record(obj, prev, HashAlg::Sha256).unwrap()
    }

    #[test]
    fn test_append_and_read_back() {
        let store = MemoryStore::new();
        let r0 = minute(0, None);
        let r1 = minute(1, Some(r0.hash()));

        assert_eq!(store.append("dev-1", &r0).unwrap(), AppendResult::Appended);
        assert_eq!(store.append("dev-1", &r1).unwrap(), AppendResult::Appended);
        assert_eq!(store.records("dev-1").unwrap(), vec![r0, r1.clone()]);
        assert_eq!(store.head("dev-1").unwrap().as_deref(), Some(r1.hash()));
        assert_eq!(store.len("dev-1").unwrap(), 2);
    }

    #[test]
    fn test_idempotent_head() {
        let store = MemoryStore::new();
        let r0 = minute(0, None);
        store.append("dev-1", &r0).unwrap();
        assert_eq!(store.append("dev-1", &r0).unwrap(), AppendResult::AlreadyHead);
        assert_eq!(store.len("dev-1").unwrap(), 1);
    }

    #[test]
    fn test_rejects_non_head() {
        let store = MemoryStore::new();
        let r0 = minute(0, None);
        let stray = minute(1, Some(&"ab".repeat(32)));
        store.append("dev-1", &r0).unwrap();
        assert!(matches!(
            store.append("dev-1", &stray),
            Err(StoreError::NotHead { .. })
        ));
        // A linked record cannot start a chain either.
        assert!(matches!(
            store.append("dev-2", &stray),
            Err(StoreError::NotHead { head: None, .. })
        ));
    }

    #[test]
    fn test_chain_ids_sorted_and_non_empty() {
        let store = MemoryStore::new();
        store.append("b", &minute(0, None)).unwrap();
        store.append("a", &minute(0, None)).unwrap();
        let _ = store.append("c", &minute(1, Some(&"00".repeat(32))));
        assert_eq!(store.chain_ids().unwrap(), vec!["a".to_owned(), "b".to_owned()]);
        assert!(store.records("zzz").unwrap().is_empty());
        assert_eq!(store.head("zzz").unwrap(), None);
    }
}
