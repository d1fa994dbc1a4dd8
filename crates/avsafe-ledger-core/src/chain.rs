//! Domain-separated hash chaining.
//!
//! `hash = H(CHAIN_DOMAIN || bytes(prev) || canonical(payload))`, where an
//! absent `prev` contributes no bytes.

use crate::canonical::canonical_payload;
use crate::crypto::HashAlg;
use crate::error::{CoreError, Result};
use crate::record::{ChainBlock, Payload, Record};
use crate::signing::Signer;
use crate::value::Object;

/// Domain tag mixed into every chain hash. Distinct from
/// [`crate::signing::SIGN_DOMAIN`] so a link can never be replayed as a
/// signature message.
pub const CHAIN_DOMAIN: &[u8] = b"avsafe:chain:v1";

/// Compute the chain hash of `payload` linked to `prev`.
pub fn chain_hash(prev: Option<&str>, payload: &Payload, alg: HashAlg) -> Result<String> {
    chain_hash_with_domain(prev, payload, alg, CHAIN_DOMAIN)
}

/// [`chain_hash`] under an explicit domain tag.
pub fn chain_hash_with_domain(
    prev: Option<&str>,
    payload: &Payload,
    alg: HashAlg,
    domain: &[u8],
) -> Result<String> {
    let prev_bytes = match prev {
        Some(hex_str) => {
            hex::decode(hex_str).map_err(|e| CoreError::InvalidPrevHash(e.to_string()))?
        }
        None => Vec::new(),
    };
    let body = canonical_payload(payload)?;
    Ok(hex::encode(alg.digest(&[domain, &prev_bytes, &body])))
}

/// Seal a payload into a new record linked to `prev`.
///
/// Fails with [`CoreError::ReservedKey`] when the object already carries a
/// `chain` key.
pub fn make_record(payload: Object, prev: Option<&str>, alg: HashAlg) -> Result<Record> {
    let payload = Payload::new(payload)?;
    seal(payload, prev, alg)
}

/// Seal an already validated payload.
pub fn seal(payload: Payload, prev: Option<&str>, alg: HashAlg) -> Result<Record> {
    let hash = chain_hash(prev, &payload, alg)?;
    let chain = ChainBlock {
        alg,
        hash,
        prev: prev.map(str::to_owned),
        signature: None,
    };
    Ok(Record::from_parts(payload, chain))
}

/// Seal a payload and attach a signature over the same canonical payload.
pub fn make_signed_record(
    payload: Object,
    prev: Option<&str>,
    alg: HashAlg,
    signer: &Signer,
    seed: Option<&[u8]>,
) -> Result<Record> {
    let payload = Payload::new(payload)?;
    let signature = signer.sign_payload(&payload, seed)?;
    let (payload, mut chain) = seal(payload, prev, alg)?.into_parts();
    chain.signature = Some(signature);
    Ok(Record::from_parts(payload, chain))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::canonicalize;
    use crate::value::Value;
    use serde_json::json;

    fn obj(json: serde_json::Value) -> Object {
        match Value::from(json) {
            Value::Object(map) => map,
            other => panic!("expected object, got {:?}", other),
        }
    }

    #[test]
    fn test_genesis_hash_is_domain_plus_canonical() {
        let payload = Payload::new(obj(json!({"idx": 0, "b": "x"}))).unwrap();
        let expected = hex::encode(HashAlg::Sha256.digest(&[
            CHAIN_DOMAIN,
            &canonicalize(&Value::Object(payload.as_object().clone())).unwrap(),
        ]));
        assert_eq!(chain_hash(None, &payload, HashAlg::Sha256).unwrap(), expected);
    }

    #[test]
    fn test_prev_changes_hash() {
        let payload = Payload::new(obj(json!({"idx": 1}))).unwrap();
        let a = chain_hash(None, &payload, HashAlg::Sha256).unwrap();
        let b = chain_hash(Some(&"00".repeat(32)), &payload, HashAlg::Sha256).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_domain_separates() {
        let payload = Payload::new(obj(json!({"idx": 1}))).unwrap();
        let a = chain_hash_with_domain(None, &payload, HashAlg::Sha256, b"one").unwrap();
        let b = chain_hash_with_domain(None, &payload, HashAlg::Sha256, b"two").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_algorithms_differ() {
        let payload = Payload::new(obj(json!({"idx": 1}))).unwrap();
        let sha = chain_hash(None, &payload, HashAlg::Sha256).unwrap();
        let blake = chain_hash(None, &payload, HashAlg::Blake2b256).unwrap();
        assert_ne!(sha, blake);
        assert_eq!(blake.len(), 64);
    }

    #[test]
    fn test_invalid_prev_hex() {
        let payload = Payload::new(obj(json!({"idx": 1}))).unwrap();
        let err = chain_hash(Some("zz"), &payload, HashAlg::Sha256).unwrap_err();
        assert!(matches!(err, CoreError::InvalidPrevHash(_)));
    }

    #[test]
    fn test_make_record_rejects_reserved_key() {
        let err = make_record(obj(json!({"chain": 1})), None, HashAlg::Sha256).unwrap_err();
        assert!(matches!(err, CoreError::ReservedKey("chain")));
    }

    #[test]
    fn test_make_record_links_prev() {
        let r0 = make_record(obj(json!({"idx": 0})), None, HashAlg::Sha256).unwrap();
        let r1 = make_record(obj(json!({"idx": 1})), Some(r0.hash()), HashAlg::Sha256).unwrap();
        assert_eq!(r0.chain().prev, None);
        assert_eq!(r1.chain().prev.as_deref(), Some(r0.hash()));
        assert!(r1.signature().is_none());
    }

    #[test]
    fn test_non_finite_payload_fails() {
        let mut map = Object::new();
        map.insert("laeq".into(), Value::Float(f64::NAN));
        let err = make_record(map, None, HashAlg::Sha256).unwrap_err();
        assert!(matches!(err, CoreError::Encoding(_)));
    }
}
