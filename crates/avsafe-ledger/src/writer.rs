//! Producer side: sealing a payload stream into a chain.

use avsafe_ledger_core::{
    make_record, make_signed_record, HashAlg, Object, Payload, Record, Signer,
};
use avsafe_ledger_store::RecordStore;
use tracing::debug;

use crate::config::{LedgerConfig, Seed, SigningMode};
use crate::error::Result;

/// Seals payloads in emission order, tracking the previous hash.
///
/// One writer per chain. The writer owns `prev`; callers only hand it
/// payloads.
#[derive(Debug)]
pub struct ChainWriter {
    alg: HashAlg,
    signer: Signer,
    seed: Option<Seed>,
    sign: bool,
    prev: Option<String>,
    written: usize,
}

impl ChainWriter {
    /// Start a new chain.
    pub fn new(config: &LedgerConfig) -> Self {
        Self::resume(config, None)
    }

    /// Continue a chain whose last record has hash `last_hash`.
    pub fn resume(config: &LedgerConfig, last_hash: Option<String>) -> Self {
        let (sign, seed) = match &config.signing {
            None => (false, None),
            // One key for the writer's lifetime, so its signatures share a public key.
            Some(SigningMode::Ephemeral) => (true, Some(Seed::random())),
            Some(SigningMode::Seeded(seed)) => (true, Some(seed.clone())),
        };
        Self {
            alg: config.hash_alg,
            signer: Signer::new(config.signer_config()),
            seed,
            sign,
            prev: last_hash,
            written: 0,
        }
    }

    /// Continue the chain `chain_id` held in `store`.
    pub fn resume_from<S: RecordStore + ?Sized>(
        config: &LedgerConfig,
        store: &S,
        chain_id: &str,
    ) -> Result<Self> {
        Ok(Self::resume(config, store.head(chain_id)?))
    }

    /// Seal the next payload.
    pub fn append(&mut self, payload: Object) -> Result<Record> {
        let record = if self.sign {
            let seed = self.seed.as_ref().map(|s| &s.as_bytes()[..]);
            make_signed_record(payload, self.prev.as_deref(), self.alg, &self.signer, seed)?
        } else {
            make_record(payload, self.prev.as_deref(), self.alg)?
        };
        self.prev = Some(record.hash().to_owned());
        self.written += 1;
        debug!(hash = record.hash(), written = self.written, "record sealed");
        Ok(record)
    }

    /// Seal a payload given as a JSON object.
    pub fn append_json(&mut self, payload: serde_json::Value) -> Result<Record> {
        let payload = Payload::try_from(payload)?;
        self.append(payload.into_object())
    }

    /// Seal the next payload and persist it.
    pub fn append_to<S: RecordStore + ?Sized>(
        &mut self,
        store: &S,
        chain_id: &str,
        payload: Object,
    ) -> Result<Record> {
        let prev = self.prev.clone();
        let written = self.written;
        let record = self.append(payload)?;
        if let Err(e) = store.append(chain_id, &record) {
            // The store did not take the record; keep the writer on its head.
            self.prev = prev;
            self.written = written;
            return Err(e.into());
        }
        Ok(record)
    }

    /// Hash of the last sealed record.
    pub fn prev(&self) -> Option<&str> {
        self.prev.as_deref()
    }

    /// Records sealed by this writer.
    pub fn written(&self) -> usize {
        self.written
    }
}
