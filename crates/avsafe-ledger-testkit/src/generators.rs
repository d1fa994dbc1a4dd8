//! Proptest generators for property-based testing.

use proptest::prelude::*;

use avsafe_ledger_core::{make_record, HashAlg, Object, Record, Value, CHAIN_KEY};

/// Either hash algorithm.
pub fn hash_alg() -> impl Strategy<Value = HashAlg> {
    prop_oneof![Just(HashAlg::Sha256), Just(HashAlg::Blake2b256)]
}

/// A 32-byte signing seed.
pub fn seed() -> impl Strategy<Value = [u8; 32]> {
    any::<[u8; 32]>()
}

/// A finite JSON scalar.
pub fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        (-1.0e6f64..1.0e6).prop_map(Value::Float),
        "[a-zA-Z0-9 _äöüßé]{0,16}".prop_map(Value::String),
    ]
}

/// Nested JSON values with finite numbers only.
pub fn value() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,8}", inner, 0..4).prop_map(Value::Object),
        ]
    })
}

/// A payload object that never carries the reserved `chain` key.
pub fn payload_object() -> impl Strategy<Value = Object> {
    prop::collection::btree_map("[a-z_]{1,10}", value(), 1..6).prop_map(|mut map| {
        map.remove(CHAIN_KEY);
        map
    })
}

/// Descriptor-like payload with realistic sound and flicker fields.
pub fn descriptor() -> impl Strategy<Value = Object> {
    (
        0usize..10_000,
        20.0f64..110.0,
        prop_oneof![Just(100.0f64), Just(120.0), Just(300.0), 1.0f64..3000.0],
        0.0f64..40.0,
    )
        .prop_map(|(idx, laeq, freq, depth)| {
            let mut audio = Object::new();
            audio.insert("laeq_db".into(), laeq.into());
            let mut light = Object::new();
            light.insert("tlm_freq_hz".into(), freq.into());
            light.insert("tlm_mod_percent".into(), depth.into());
            let mut payload = Object::new();
            payload.insert("idx".into(), idx.into());
            payload.insert("device_id".into(), "dev-prop".into());
            payload.insert("audio".into(), Value::Object(audio));
            payload.insert("light".into(), Value::Object(light));
            payload
        })
}

/// An unsigned chain of `len` records.
pub fn chain(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<Record>> {
    (prop::collection::vec(payload_object(), len), hash_alg()).prop_map(|(payloads, alg)| {
        build_chain(payloads, alg)
    })
}

/// Link payloads into a chain from genesis.
pub fn build_chain(payloads: Vec<Object>, alg: HashAlg) -> Vec<Record> {
    let mut prev: Option<String> = None;
    payloads
        .into_iter()
        .filter_map(|payload| {
            // Generated payloads are finite and free of the reserved key.
            let record = make_record(payload, prev.as_deref(), alg).ok()?;
            prev = Some(record.hash().to_owned());
            Some(record)
        })
        .collect()
}

/// A way to damage a stored chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tamper {
    /// Overwrite a payload field of record `index`.
    EditPayload { index: usize },
    /// Swap records `index` and `index + 1`.
    Swap { index: usize },
    /// Drop record `index`.
    Remove { index: usize },
}

impl Tamper {
    /// First index whose verification must fail after applying this.
    pub fn expected_break(&self) -> usize {
        match *self {
            Tamper::EditPayload { index } | Tamper::Swap { index } | Tamper::Remove { index } => {
                index
            }
        }
    }

    /// Apply to `records`. Returns `false` when the chain is too short.
    pub fn apply(&self, records: &mut Vec<Record>) -> bool {
        match *self {
            Tamper::EditPayload { index } => {
                let Some(record) = records.get(index).cloned() else {
                    return false;
                };
                let (payload, chain) = record.into_parts();
                let mut object = payload.into_object();
                object.insert("tampered!".into(), Value::Bool(true));
                let Ok(payload) = avsafe_ledger_core::Payload::new(object) else {
                    return false;
                };
                records[index] = Record::from_parts(payload, chain);
                true
            }
            Tamper::Swap { index } => {
                if index + 1 >= records.len() {
                    return false;
                }
                records.swap(index, index + 1);
                true
            }
            Tamper::Remove { index } => {
                // Dropping the last record leaves a valid shorter chain.
                if index + 1 >= records.len() {
                    return false;
                }
                records.remove(index);
                true
            }
        }
    }
}

/// A tamper operation targeting an index below `len`.
pub fn tamper(len: usize) -> impl Strategy<Value = Tamper> {
    let max = len.max(1);
    prop_oneof![
        (0..max).prop_map(|index| Tamper::EditPayload { index }),
        (0..max).prop_map(|index| Tamper::Swap { index }),
        (0..max).prop_map(|index| Tamper::Remove { index }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use avsafe_ledger_core::{verify_chain, VerifyOptions};

    proptest! {
        #[test]
        fn generated_chains_verify(records in chain(0..8)) {
            let verdict = verify_chain(&records, &VerifyOptions::default());
            prop_assert!(verdict.ok);
            prop_assert_eq!(verdict.count, records.len());
        }

        #[test]
        fn tampering_breaks_at_the_expected_index(
            mut records in chain(3..8),
            op in tamper(7),
        ) {
            prop_assume!(op.apply(&mut records));
            let verdict = verify_chain(&records, &VerifyOptions::default());
            prop_assert!(!verdict.ok);
            prop_assert_eq!(verdict.break_index, Some(op.expected_break()));
        }
    }
}
