//! The Ledger: unified API for sealing, verifying and auditing descriptor
//! chains.

use std::io::BufRead;
use std::thread;

use avsafe_ledger_core::{
    verify_chain, verify_values, ChainVerdict, ChainVerifier, Payload, Record, TrustedKeys, Value,
    VerifyOptions,
};
use avsafe_ledger_rules::{evaluate, record_findings, EvaluationResult, Profile, RecordFindings};
use avsafe_ledger_store::{Entry, Lines, RecordStore};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::LedgerConfig;
use crate::error::Result;
use crate::writer::ChainWriter;

/// Verification and evaluation of one chain, as handed to an auditor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditReport {
    pub verification: ChainVerdict,
    pub evaluation: EvaluationResult,
    /// Per-record findings, records without findings omitted.
    pub findings: Vec<RecordFindings>,
}

impl AuditReport {
    /// The chain verified and no compliance flag was raised.
    pub fn is_clean(&self) -> bool {
        self.verification.ok && self.evaluation.flags.is_empty()
    }
}

/// Verdict for one stored chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredVerdict {
    pub chain_id: String,
    pub verdict: ChainVerdict,
}

/// The main Ledger struct.
///
/// Holds the configuration and the trusted device keys; everything else is
/// passed per call.
#[derive(Debug, Clone)]
pub struct Ledger {
    config: LedgerConfig,
    options: VerifyOptions,
}

impl Ledger {
    pub fn new(config: LedgerConfig) -> Self {
        Self::with_trusted_keys(config, TrustedKeys::new())
    }

    /// A ledger that checks signatures of listed devices against pinned keys.
    pub fn with_trusted_keys(config: LedgerConfig, trusted_keys: TrustedKeys) -> Self {
        let options = config.verify_options(trusted_keys);
        Self { config, options }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn verify_options(&self) -> &VerifyOptions {
        &self.options
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writing
    // ─────────────────────────────────────────────────────────────────────────

    /// A writer for a new chain.
    pub fn writer(&self) -> ChainWriter {
        ChainWriter::new(&self.config)
    }

    /// A writer continuing the chain `chain_id` in `store`.
    pub fn writer_for<S: RecordStore + ?Sized>(&self, store: &S, chain_id: &str) -> Result<ChainWriter> {
        ChainWriter::resume_from(&self.config, store, chain_id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Verification
    // ─────────────────────────────────────────────────────────────────────────

    pub fn verify(&self, records: &[Record]) -> ChainVerdict {
        logged(verify_chain(records, &self.options))
    }

    /// Verify raw values; entries that are not records break the chain.
    pub fn verify_values(&self, values: &[Value]) -> ChainVerdict {
        logged(verify_values(values, &self.options))
    }

    /// Verify stored entries; damaged lines break the chain at their index.
    pub fn verify_entries(&self, entries: &[Entry]) -> ChainVerdict {
        let mut verifier = ChainVerifier::new(&self.options);
        for entry in entries {
            match entry {
                Ok(record) => verifier.push(record),
                Err(e) => verifier.push_malformed(e.to_string()),
            }
        }
        logged(verifier.finish())
    }

    /// Verify an NDJSON stream without holding it in memory.
    ///
    /// Lines that are not JSON or not records are counted as breaks at
    /// their position. Only read failures are errors.
    pub fn verify_jsonl<R: BufRead>(&self, reader: R) -> Result<ChainVerdict> {
        let mut verifier = ChainVerifier::new(&self.options);
        for item in Lines::new(reader) {
            match item {
                Ok(value) => match Record::from_value(value) {
                    Ok(record) => verifier.push(&record),
                    Err(e) => verifier.push_malformed(e.to_string()),
                },
                Err(e) if e.is_line_error() => verifier.push_malformed(e.to_string()),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(logged(verifier.finish()))
    }

    /// Verify one chain held in a store.
    ///
    /// Damaged entries are breaks in the verdict. Only a chain that cannot
    /// be read at all is an error.
    pub fn verify_stored<S: RecordStore + ?Sized>(&self, store: &S, chain_id: &str) -> Result<ChainVerdict> {
        let entries = store.entries(chain_id)?;
        debug!(chain_id, count = entries.len(), "verifying stored chain");
        Ok(self.verify_entries(&entries))
    }

    /// Verify independent chains in parallel. Verdicts are in input order.
    pub fn verify_many<C>(&self, chains: &[C]) -> Vec<ChainVerdict>
    where
        C: AsRef<[Record]> + Sync,
    {
        in_parallel(chains, |chain| self.verify(chain.as_ref()))
    }

    /// Verify every chain in a store, in chain id order.
    ///
    /// A damaged chain gets a failing verdict of its own and does not stop
    /// the others.
    pub fn verify_store_all<S: RecordStore + ?Sized>(&self, store: &S) -> Result<Vec<StoredVerdict>> {
        let ids = store.chain_ids()?;
        let chains = ids
            .iter()
            .map(|id| store.entries(id))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let verdicts = in_parallel(&chains, |entries| self.verify_entries(entries));
        let failed = verdicts.iter().filter(|v| !v.ok).count();
        info!(chains = ids.len(), failed, "store verified");
        Ok(ids
            .into_iter()
            .zip(verdicts)
            .map(|(chain_id, verdict)| StoredVerdict { chain_id, verdict })
            .collect())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Compliance
    // ─────────────────────────────────────────────────────────────────────────

    pub fn evaluate(&self, records: &[Record], profile: &Profile, locale: Option<&str>) -> EvaluationResult {
        evaluate(payloads(records), profile, locale)
    }

    /// Evaluate bare payloads, e.g. descriptors not yet sealed.
    pub fn evaluate_payloads(&self, payloads: &[Payload], profile: &Profile, locale: Option<&str>) -> EvaluationResult {
        evaluate(payloads, profile, locale)
    }

    /// Verify a chain and evaluate it against a profile.
    ///
    /// Evaluation runs over every record even when verification fails; the
    /// report carries both outcomes.
    pub fn audit(&self, records: &[Record], profile: &Profile, locale: Option<&str>) -> AuditReport {
        let readable: Vec<(usize, &Record)> = records.iter().enumerate().collect();
        report(self.verify(records), &readable, profile, locale)
    }

    /// [`audit`](Self::audit) a stored chain.
    ///
    /// Damaged entries fail verification and are left out of the
    /// evaluation. Finding indices still count them.
    pub fn audit_stored<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        chain_id: &str,
        profile: &Profile,
        locale: Option<&str>,
    ) -> Result<AuditReport> {
        let entries = store.entries(chain_id)?;
        let readable: Vec<(usize, &Record)> = entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| entry.as_ref().ok().map(|record| (i, record)))
            .collect();
        Ok(report(self.verify_entries(&entries), &readable, profile, locale))
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

fn payloads(records: &[Record]) -> impl Iterator<Item = &Payload> {
    records.iter().map(Record::payload)
}

/// Evaluate `readable` records, each tagged with its stream position.
fn report(
    verification: ChainVerdict,
    readable: &[(usize, &Record)],
    profile: &Profile,
    locale: Option<&str>,
) -> AuditReport {
    if !verification.ok {
        warn!(
            break_index = verification.break_index,
            "auditing a chain that failed verification"
        );
    }
    let payloads = || readable.iter().map(|(_, record)| record.payload());
    let mut findings = record_findings(payloads(), profile, locale);
    for finding in &mut findings {
        finding.index = readable[finding.index].0;
    }
    AuditReport {
        verification,
        evaluation: evaluate(payloads(), profile, locale),
        findings,
    }
}

/// Run `verify` over every item on scoped threads, results in input order.
fn in_parallel<T, F>(items: &[T], verify: F) -> Vec<ChainVerdict>
where
    T: Sync,
    F: Fn(&T) -> ChainVerdict + Sync,
{
    if items.len() <= 1 {
        return items.iter().map(&verify).collect();
    }
    let verify = &verify;
    thread::scope(|s| {
        let handles: Vec<_> = items
            .iter()
            .map(|item| s.spawn(move || verify(item)))
            .collect();
        handles
            .into_iter()
            .map(|h| match h.join() {
                Ok(verdict) => verdict,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    })
}

fn logged(verdict: ChainVerdict) -> ChainVerdict {
    if verdict.ok {
        debug!(count = verdict.count, "chain verified");
    } else {
        warn!(
            count = verdict.count,
            break_index = verdict.break_index,
            reason = verdict.reason.as_deref(),
            "chain verification failed"
        );
    }
    verdict
}
