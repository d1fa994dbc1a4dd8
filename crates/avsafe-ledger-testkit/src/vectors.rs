//! Golden vectors for chain hashes and payload signatures.
//!
//! The expected values were produced independently of this crate. Any
//! implementation that reads or writes these chains must reproduce them
//! byte for byte.

use anyhow::{anyhow, ensure, Context};
use avsafe_ledger_core::{
    canonical_payload, chain_hash, signing_message, HashAlg, Keypair, Payload, SignatureBackend,
    SignatureScheme, Signer, SignerConfig,
};
use serde::Serialize;

/// A golden vector.
#[derive(Debug, Clone, Serialize)]
pub struct GoldenVector {
    pub name: &'static str,
    /// Ed25519 seed, one byte repeated 32 times.
    pub seed_byte: u8,
    pub alg: HashAlg,
    /// Hash of the preceding record, `None` for a genesis record.
    pub prev: Option<&'static str>,
    /// Input payload: unsorted keys, arbitrary whitespace.
    pub payload_json: &'static str,

    pub expected_canonical: &'static str,
    pub expected_hash: &'static str,
    pub expected_public_key: &'static str,
    pub expected_signature: &'static str,
    /// `sha256-demo` MAC under the default secret.
    pub expected_demo_signature: &'static str,
}

impl GoldenVector {
    pub fn seed(&self) -> [u8; 32] {
        [self.seed_byte; 32]
    }

    pub fn payload(&self) -> anyhow::Result<Payload> {
        let json: serde_json::Value = serde_json::from_str(self.payload_json)
            .with_context(|| format!("vector {}: payload is not JSON", self.name))?;
        Payload::try_from(json).map_err(|e| anyhow!("vector {}: {}", self.name, e))
    }
}

const GENESIS_SHA256: &str = "1b0be01357d0a7f0fe9a6a13b7b55d238b3310b1491766ae269f7973e6b995ae";
const DEV1_PUBLIC_KEY: &str = "2152f8d19b791d24453242e15f2eab6cb7cffa7b6a5ed30097960e069881db12";

/// All golden vectors. The second links to the first.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "genesis minute, sha256",
            seed_byte: 0x42,
            alg: HashAlg::Sha256,
            prev: None,
            payload_json: r#"{"ts": "2025-01-01T00:00:00Z", "idx": 0, "device_id": "dev-1",
                "audio": {"laeq_db": 52.5, "lcpeak_db": 78.0},
                "light": {"tlm_mod_percent": 3.25, "tlm_freq_hz": 100.0}}"#,
            expected_canonical: r#"{"audio":{"laeq_db":52.5,"lcpeak_db":78.0},"device_id":"dev-1","idx":0,"light":{"tlm_freq_hz":100.0,"tlm_mod_percent":3.25},"ts":"2025-01-01T00:00:00Z"}"#,
            expected_hash: GENESIS_SHA256,
            expected_public_key: DEV1_PUBLIC_KEY,
            expected_signature: "707b3d23c43550f6cb61bf30a90ef745217e464f282590358b40c4f1b35375722efc82c2860b69f6c52e8188e7c4f1b0bfd6a2a4d29be23dd20a8ad72e69a400",
            expected_demo_signature: "34def1e49cfaa14eb2a4c62df089588022f9212e1e542c301ee1d43b1f501fa1",
        },
        GoldenVector {
            name: "second minute, sha256",
            seed_byte: 0x42,
            alg: HashAlg::Sha256,
            prev: Some(GENESIS_SHA256),
            payload_json: r#"{"idx": 1, "ts": "2025-01-01T00:01:00Z", "device_id": "dev-1",
                "audio": {"laeq_db": 61.0, "lcpeak_db": 80.5},
                "light": {"tlm_freq_hz": 120.0, "tlm_mod_percent": 0.5}}"#,
            expected_canonical: r#"{"audio":{"laeq_db":61.0,"lcpeak_db":80.5},"device_id":"dev-1","idx":1,"light":{"tlm_freq_hz":120.0,"tlm_mod_percent":0.5},"ts":"2025-01-01T00:01:00Z"}"#,
            expected_hash: "6308c0444ac448820a8ed8baad5619aeb693760ffcc1756f1ec56220a549d355",
            expected_public_key: DEV1_PUBLIC_KEY,
            expected_signature: "c8aec9ab2e15687bc41ef834a633743908b4251a033a3fc0ebf90d10888ccc09302235f612a676c0dfa9957f182c74dfd7353871185132587bd9195dd86e9a06",
            expected_demo_signature: "ded6ea9960e25f7ac1aca32d621166d962ac8850fc930ad1c875e1e2373f4a7a",
        },
        GoldenVector {
            name: "genesis, blake2b-256, flat fields",
            seed_byte: 0x07,
            alg: HashAlg::Blake2b256,
            prev: None,
            payload_json: r#"{"idx": 0, "device_id": "dev-2", "laeq_db": 44}"#,
            expected_canonical: r#"{"device_id":"dev-2","idx":0,"laeq_db":44}"#,
            expected_hash: "a825901085f7f94bd1d17e6f8f7d22bded75495736179dd94949ac8e65eac6f1",
            expected_public_key: "ea4a6c63e29c520abef5507b132ec5f9954776aebebe7b92421eea691446d22c",
            expected_signature: "d71b7c1abb29b29a02daff2470b91168d25430e72ddfbcc464af6f629506945dce3adf00d3998555043c3007321a725072ad38ce8f4d02db6fe920b48a242a02",
            expected_demo_signature: "8cf264463a6e2f193e81f107717dc79f81d87435adec61d82788bcace51fb0da",
        },
        GoldenVector {
            name: "non-ASCII text kept literal",
            seed_byte: 0x00,
            alg: HashAlg::Sha256,
            prev: None,
            payload_json: r#"{"note": "Lärm über Straße", "idx": 2, "tags": ["nächtlich", "b"]}"#,
            expected_canonical: r#"{"idx":2,"note":"Lärm über Straße","tags":["nächtlich","b"]}"#,
            expected_hash: "648b47af3c5e2ff7ab4c7fb126c2754141242c4efc63fa9305c69598f8793b02",
            expected_public_key: "3b6a27bcceb6a42d62a3a8d02a6f0d73653215771de243a63ac048a18b59da29",
            expected_signature: "4e369a6253fd6f961bec5058fdfc311cca5b0e465b2cbddc3d1bc4d0118eca5eaf530bdf6dc41429d5536686cbad757dcdd59390ea085047b7a6333b8ba74a05",
            expected_demo_signature: "275f50008f3b39986c5ef6f03e47d520adaecc13426ebce641b04ed503de9efb",
        },
        GoldenVector {
            name: "exponent-form floats",
            seed_byte: 0x42,
            alg: HashAlg::Sha256,
            prev: None,
            // Shortest round-trip form: no `+`, no zero-padded exponent.
            payload_json: r#"{"idx": 3, "device_id": "dev-1", "energy_j": 1e+16, "peak_ratio": 1.5E-9,
                "light": {"flicker_index": 1e-07, "tlm_mod_percent": 2.5e-05}}"#,
            expected_canonical: r#"{"device_id":"dev-1","energy_j":1e16,"idx":3,"light":{"flicker_index":1e-7,"tlm_mod_percent":0.000025},"peak_ratio":1.5e-9}"#,
            expected_hash: "03ef7e8c8199b8976f3b681146c2f4db4cdc407638dfd09f4fcfe3445839d6df",
            expected_public_key: DEV1_PUBLIC_KEY,
            expected_signature: "ce8fb6344fcf00c7073a0c558f7824a14d25f232a0dce636fba6d66d1ebb9e2f2b23b48fe719e8ac2352eb76a96bab7f5b9a2e2ef4404b9a59315b2b50d0bd03",
            expected_demo_signature: "1ed4ef2ed0015a5bbc14fb139b939aa9c2b36294bc1df4a4a34540d6c5a42f5f",
        },
    ]
}

/// Recompute every output of a vector and compare.
pub fn check_vector(vector: &GoldenVector) -> anyhow::Result<()> {
    let payload = vector.payload()?;

    let canonical = canonical_payload(&payload)?;
    ensure!(
        canonical == vector.expected_canonical.as_bytes(),
        "{}: canonical bytes differ: {}",
        vector.name,
        String::from_utf8_lossy(&canonical)
    );

    let hash = chain_hash(vector.prev, &payload, vector.alg)?;
    ensure!(hash == vector.expected_hash, "{}: chain hash {}", vector.name, hash);

    let keypair = Keypair::from_seed(&vector.seed());
    let expected_key = hex::decode(vector.expected_public_key)
        .with_context(|| format!("{}: expected public key is not hex", vector.name))?;
    ensure!(
        keypair.public_key().as_bytes()[..] == expected_key[..],
        "{}: public key {}",
        vector.name,
        keypair.public_key().to_hex()
    );

    let block = Signer::default().sign_payload(&payload, Some(&vector.seed()[..]))?;
    ensure!(
        block.signature == vector.expected_signature,
        "{}: signature {}",
        vector.name,
        block.signature
    );

    let demo = Signer::new(SignerConfig {
        backend: SignatureBackend::Unavailable,
        strict: false,
    });
    let message = signing_message(&payload)?;
    ensure!(
        demo.verify(&message, vector.expected_demo_signature, None, SignatureScheme::Sha256Demo),
        "{}: demo signature rejected",
        vector.name
    );
    Ok(())
}

/// Check all vectors, reporting `(name, outcome)` for each.
pub fn verify_all_vectors() -> Vec<(&'static str, anyhow::Result<()>)> {
    all_vectors().iter().map(|v| (v.name, check_vector(v))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_vector_links_to_first() {
        let vectors = all_vectors();
        assert_eq!(vectors[1].prev, Some(vectors[0].expected_hash));
    }

    #[test]
    fn test_vector_names_unique() {
        let vectors = all_vectors();
        let mut names: Vec<_> = vectors.iter().map(|v| v.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), vectors.len());
    }
}
