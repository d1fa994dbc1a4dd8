//! Ledger replay: chain continuity plus signature classification.
//!
//! Verification never fails. Every mismatch, malformed record or bad
//! signature ends up in the returned [`ChainVerdict`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::chain::chain_hash;
use crate::crypto::PublicKey;
use crate::error::Result;
use crate::record::{Record, SignatureScheme};
use crate::signing::{signing_message, SignatureBackend, Signer, SignerConfig};
use crate::value::Value;

/// Device id to Ed25519 public key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedKeys {
    keys: HashMap<String, PublicKey>,
}

impl TrustedKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, device_id: impl Into<String>, key: PublicKey) -> Option<PublicKey> {
        self.keys.insert(device_id.into(), key)
    }

    /// Parse every `(device_id, hex key)` pair; the first bad key fails.
    pub fn from_hex_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut keys = HashMap::new();
        for (device, hex_key) in pairs {
            keys.insert(device.into(), PublicKey::from_hex(hex_key.as_ref())?);
        }
        Ok(Self { keys })
    }

    pub fn get(&self, device_id: &str) -> Option<&PublicKey> {
        self.keys.get(device_id)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Options for one verification run.
#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    pub backend: SignatureBackend,
    /// Demo and unverifiable signatures fail the run.
    pub strict: bool,
    /// Unsigned records fail the run.
    pub require_signatures: bool,
    pub trusted_keys: TrustedKeys,
}

impl VerifyOptions {
    fn signer(&self) -> Signer {
        Signer::new(SignerConfig {
            backend: self.backend,
            strict: self.strict,
        })
    }
}

/// Outcome of checking one record's signature block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureStatus {
    Valid,
    Invalid,
    Missing,
    Unverified,
}

/// Signature counts over every record in the stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigSummary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub missing: usize,
    pub unverified: usize,
}

impl SigSummary {
    fn record(&mut self, status: SignatureStatus) {
        self.total += 1;
        match status {
            SignatureStatus::Valid => self.valid += 1,
            SignatureStatus::Invalid => self.invalid += 1,
            SignatureStatus::Missing => self.missing += 1,
            SignatureStatus::Unverified => self.unverified += 1,
        }
    }
}

/// The verdict of a verification run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerdict {
    pub ok: bool,
    /// Every link recomputed and matched.
    pub chain_ok: bool,
    /// Earliest failing index, chain or signature.
    pub break_index: Option<usize>,
    pub reason: Option<String>,
    pub count: usize,
    /// Stored hash of the final well-formed record.
    pub last_hash: Option<String>,
    /// Last `device_id` seen in a payload.
    pub device_id: Option<String>,
    pub sig_summary: SigSummary,
    /// Per-record signature status, in stream order.
    pub signatures: Vec<SignatureStatus>,
}

/// Incremental verifier: feed records in order, then call [`finish`].
///
/// [`finish`]: ChainVerifier::finish
#[derive(Debug)]
pub struct ChainVerifier<'a> {
    options: &'a VerifyOptions,
    signer: Signer,
    prev: Option<String>,
    count: usize,
    device_id: Option<String>,
    chain_break: Option<(usize, String)>,
    signature_failure: Option<(usize, String)>,
    summary: SigSummary,
    statuses: Vec<SignatureStatus>,
}

impl<'a> ChainVerifier<'a> {
    pub fn new(options: &'a VerifyOptions) -> Self {
        Self {
            options,
            signer: options.signer(),
            prev: None,
            count: 0,
            device_id: None,
            chain_break: None,
            signature_failure: None,
            summary: SigSummary::default(),
            statuses: Vec::new(),
        }
    }

    /// Check the next record.
    pub fn push(&mut self, record: &Record) {
        let index = self.count;
        self.count += 1;

        if let Some(device) = record.payload().device_id() {
            self.device_id = Some(device.to_owned());
        }

        if self.chain_break.is_none() {
            if let Some(reason) = self.link_failure(record) {
                warn!(index, %reason, "chain break");
                self.chain_break = Some((index, reason));
            }
        }
        self.prev = Some(record.hash().to_owned());

        let (status, reason) = self.classify(record);
        debug!(index, ?status, "signature classified");
        self.note_signature(index, status, reason);
    }

    /// Count a stream entry that could not be read as a record.
    pub fn push_malformed(&mut self, reason: impl Into<String>) {
        let index = self.count;
        self.count += 1;
        let reason = format!("malformed record: {}", reason.into());
        warn!(index, %reason, "chain break");
        if self.chain_break.is_none() {
            self.chain_break = Some((index, reason.clone()));
        }
        self.note_signature(index, SignatureStatus::Invalid, Some(reason));
    }

    pub fn finish(self) -> ChainVerdict {
        let chain_ok = self.chain_break.is_none();
        let failure = match (self.chain_break, self.signature_failure) {
            (Some(c), Some(s)) => Some(if s.0 < c.0 { s } else { c }),
            (c, s) => c.or(s),
        };
        let (break_index, reason) = match failure {
            Some((i, r)) => (Some(i), Some(r)),
            None => (None, None),
        };
        ChainVerdict {
            ok: break_index.is_none(),
            chain_ok,
            break_index,
            reason,
            count: self.count,
            last_hash: self.prev,
            device_id: self.device_id,
            sig_summary: self.summary,
            signatures: self.statuses,
        }
    }

    fn link_failure(&self, record: &Record) -> Option<String> {
        let chain = record.chain();
        if let Some(stored_prev) = chain.prev.as_deref() {
            if Some(stored_prev) != self.prev.as_deref() {
                return Some("prev does not match preceding record hash".to_owned());
            }
        }
        match chain_hash(self.prev.as_deref(), record.payload(), chain.alg) {
            Ok(expected) if expected == chain.hash => None,
            Ok(_) => Some("hash mismatch".to_owned()),
            Err(e) => Some(format!("hash not recomputable: {}", e)),
        }
    }

    fn classify(&self, record: &Record) -> (SignatureStatus, Option<String>) {
        let Some(block) = record.signature() else {
            return (SignatureStatus::Missing, None);
        };
        match block.scheme {
            SignatureScheme::Unknown => {
                (SignatureStatus::Invalid, Some("unknown signature scheme".into()))
            }
            SignatureScheme::Sha256Demo if self.options.strict => (
                SignatureStatus::Invalid,
                Some("sha256-demo signature rejected in strict mode".into()),
            ),
            SignatureScheme::Sha256Demo => {
                self.check(record, block.scheme, &block.signature, None)
            }
            SignatureScheme::Ed25519 if self.options.backend == SignatureBackend::Unavailable => {
                (SignatureStatus::Unverified, None)
            }
            SignatureScheme::Ed25519 => {
                let trusted = record
                    .payload()
                    .device_id()
                    .and_then(|d| self.options.trusted_keys.get(d));
                match (trusted, block.public_key.as_deref()) {
                    (Some(key), embedded) => {
                        if let Some(embedded) = embedded {
                            if PublicKey::from_hex(embedded).ok().as_ref() != Some(key) {
                                return (
                                    SignatureStatus::Invalid,
                                    Some("embedded public key differs from trusted key".into()),
                                );
                            }
                        }
                        let key_hex = key.to_hex();
                        self.check(record, block.scheme, &block.signature, Some(&key_hex))
                    }
                    (None, Some(embedded)) => {
                        self.check(record, block.scheme, &block.signature, Some(embedded))
                    }
                    (None, None) => (
                        SignatureStatus::Invalid,
                        Some("ed25519 signature without public key".into()),
                    ),
                }
            }
        }
    }

    fn check(
        &self,
        record: &Record,
        scheme: SignatureScheme,
        signature: &str,
        public_key: Option<&str>,
    ) -> (SignatureStatus, Option<String>) {
        let verified = signing_message(record.payload())
            .map(|message| self.signer.verify(&message, signature, public_key, scheme))
            .unwrap_or(false);
        if verified {
            (SignatureStatus::Valid, None)
        } else {
            (SignatureStatus::Invalid, Some("signature does not verify".into()))
        }
    }

    fn note_signature(&mut self, index: usize, status: SignatureStatus, reason: Option<String>) {
        self.summary.record(status);
        self.statuses.push(status);
        if self.signature_failure.is_some() {
            return;
        }
        let failure = match status {
            SignatureStatus::Valid => None,
            SignatureStatus::Invalid => {
                Some(reason.unwrap_or_else(|| "invalid signature".into()))
            }
            SignatureStatus::Missing if self.options.require_signatures => {
                Some("signature required but missing".into())
            }
            SignatureStatus::Unverified if self.options.strict => {
                Some("signature cannot be verified without an Ed25519 backend".into())
            }
            SignatureStatus::Missing | SignatureStatus::Unverified => None,
        };
        if let Some(reason) = failure {
            self.signature_failure = Some((index, reason));
        }
    }
}

/// Replay a sequence of records.
pub fn verify_chain(records: &[Record], options: &VerifyOptions) -> ChainVerdict {
    let mut verifier = ChainVerifier::new(options);
    for record in records {
        verifier.push(record);
    }
    verifier.finish()
}

/// Replay raw parsed objects; entries that are not records count as breaks.
pub fn verify_values(values: &[Value], options: &VerifyOptions) -> ChainVerdict {
    let mut verifier = ChainVerifier::new(options);
    for value in values {
        match Record::from_value(value.clone()) {
            Ok(record) => verifier.push(&record),
            Err(e) => verifier.push_malformed(e.to_string()),
        }
    }
    verifier.finish()
}
