//! Property tests for canonicalization, chaining and verification.

use avsafe_ledger_core::{
    canonicalize, chain_hash, make_record, make_signed_record, verify_chain, CoreError, HashAlg,
    Keypair, Object, Payload, Record, SignatureScheme, Signer, Value, VerifyOptions, CHAIN_DOMAIN,
};
use proptest::prelude::*;

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        (-1.0e9f64..1.0e9).prop_map(Value::Float),
        "[a-zA-Z0-9 äöüé]{0,12}".prop_map(Value::String),
    ]
}

fn value_tree() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::vec(("[a-z]{1,6}", inner), 0..4)
                .prop_map(|entries| Value::Object(entries.into_iter().collect())),
        ]
    })
}

fn entries() -> impl Strategy<Value = Vec<(String, Value)>> {
    prop::collection::vec(("[a-z_]{1,8}", value_tree()), 1..6).prop_map(|mut entries| {
        entries.retain(|(k, _)| k != "chain");
        entries
    })
}

fn payload_object() -> impl Strategy<Value = Object> {
    entries().prop_map(|e| e.into_iter().collect())
}

fn build_chain(payloads: &[Object]) -> Vec<Record> {
    let mut prev: Option<String> = None;
    payloads
        .iter()
        .map(|p| {
            let r = make_record(p.clone(), prev.as_deref(), HashAlg::Sha256).unwrap();
            prev = Some(r.hash().to_owned());
            r
        })
        .collect()
}

proptest! {
    #[test]
    fn canonical_is_insertion_order_independent(entries in entries(), seed in any::<u64>()) {
        // Deduplicate keys first so both maps hold the same content.
        let forward: Object = entries.iter().cloned().collect();
        let mut shuffled: Vec<(String, Value)> = forward.clone().into_iter().collect();
        let n = shuffled.len();
        if n > 1 {
            shuffled.rotate_left((seed as usize) % n);
            shuffled.reverse();
        }
        let backward: Object = shuffled.into_iter().collect();
        prop_assert_eq!(
            canonicalize(&Value::Object(forward)).unwrap(),
            canonicalize(&Value::Object(backward)).unwrap()
        );
    }

    #[test]
    fn canonical_fails_iff_non_finite(tree in value_tree(), poison in prop::option::of(prop_oneof![
        Just(f64::NAN), Just(f64::INFINITY), Just(f64::NEG_INFINITY)
    ])) {
        let value = match poison {
            Some(bad) => Value::Array(vec![tree, Value::Float(bad)]),
            None => tree,
        };
        let result = canonicalize(&value);
        if value.contains_non_finite() {
            prop_assert!(matches!(result, Err(CoreError::Encoding(_))));
        } else {
            prop_assert!(result.is_ok());
        }
    }

    #[test]
    fn genesis_hash_is_direct_digest(obj in payload_object()) {
        let payload = Payload::new(obj.clone()).unwrap();
        let body = canonicalize(&Value::Object(obj)).unwrap();
        let direct = hex::encode(HashAlg::Sha256.digest(&[CHAIN_DOMAIN, &body]));
        prop_assert_eq!(chain_hash(None, &payload, HashAlg::Sha256).unwrap(), direct);
    }

    #[test]
    fn tampering_first_payload_changes_every_hash(
        payloads in prop::collection::vec(payload_object(), 3..6),
    ) {
        let original = build_chain(&payloads);
        let mut altered = payloads.clone();
        altered[0].insert("tampered!".into(), Value::Bool(true));
        let rebuilt = build_chain(&altered);
        for (a, b) in original.iter().zip(&rebuilt) {
            prop_assert_ne!(a.hash(), b.hash());
        }
    }

    #[test]
    fn altered_hash_breaks_at_k(
        payloads in prop::collection::vec(payload_object(), 2..8),
        k_seed in any::<usize>(),
    ) {
        let signer = Signer::default();
        let seed = [0x5au8; 32];
        let mut prev: Option<String> = None;
        let mut records: Vec<Record> = payloads
            .iter()
            .map(|p| {
                let r = make_signed_record(p.clone(), prev.as_deref(), HashAlg::Sha256, &signer, Some(&seed))
                    .unwrap();
                prev = Some(r.hash().to_owned());
                r
            })
            .collect();
        let n = records.len();
        let k = k_seed % n;
        let (payload, mut chain) = records[k].clone().into_parts();
        chain.hash = "ee".repeat(32);
        records[k] = Record::from_parts(payload, chain);

        let verdict = verify_chain(&records, &VerifyOptions::default());
        prop_assert!(!verdict.ok);
        prop_assert_eq!(verdict.break_index, Some(k));
        prop_assert_eq!(verdict.sig_summary.total, n);
        prop_assert_eq!(verdict.sig_summary.valid, n);
    }

    #[test]
    fn sign_verify_roundtrip(seed in any::<[u8; 32]>(), message in prop::collection::vec(any::<u8>(), 0..64)) {
        let signer = Signer::default();
        let block = signer.sign(&message, Some(&seed)).unwrap();
        let pk = Keypair::from_seed(&seed).public_key().to_hex();
        prop_assert!(signer.verify(&message, &block.signature, Some(&pk), SignatureScheme::Ed25519));

        let mut other = message.clone();
        other.push(0);
        prop_assert!(!signer.verify(&other, &block.signature, Some(&pk), SignatureScheme::Ed25519));
    }
}

#[test]
fn untampered_signed_chain_fully_valid() {
    let signer = Signer::default();
    let mut prev: Option<String> = None;
    let mut records = Vec::new();
    for i in 0..10i64 {
        let mut obj = Object::new();
        obj.insert("idx".into(), Value::Int(i));
        obj.insert("device_id".into(), Value::from("dev-7"));
        let r = make_signed_record(obj, prev.as_deref(), HashAlg::Blake2b256, &signer, Some(&[1u8; 32]))
            .unwrap();
        prev = Some(r.hash().to_owned());
        records.push(r);
    }
    let verdict = verify_chain(&records, &VerifyOptions::default());
    assert!(verdict.ok);
    assert_eq!(verdict.sig_summary.valid, 10);
    assert_eq!(verdict.last_hash, prev);
}

#[test]
fn ndjson_line_verifies_after_reparse() {
    let mut obj = Object::new();
    obj.insert("idx".into(), Value::Int(0));
    obj.insert("text".into(), Value::from("Lärm über 55 dB"));
    obj.insert("laeq".into(), Value::Float(70.0));
    let record = make_record(obj, None, HashAlg::Sha256).unwrap();

    let line = serde_json::to_string(&record).unwrap();
    let back: Record = serde_json::from_str(&line).unwrap();
    assert_eq!(back, record);
    assert!(verify_chain(&[back], &VerifyOptions::default()).ok);
}
