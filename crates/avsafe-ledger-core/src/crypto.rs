//! Cryptographic primitives for the ledger.
//!
//! Wraps SHA-256 / BLAKE2b-256 chain hashing and Ed25519 signing with
//! strong types.

use std::fmt;
use std::str::FromStr;

use blake2::digest::consts::U32;
use blake2::Blake2b;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CoreError, Result};

type Blake2b256 = Blake2b<U32>;

/// Length in bytes of every chain digest, whatever the algorithm.
pub const DIGEST_LEN: usize = 32;

/// Hash function used to link records.
///
/// Both variants produce 32-byte digests so length checks do not depend
/// on the algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HashAlg {
    #[default]
    #[serde(rename = "sha256")]
    Sha256,
    #[serde(rename = "blake2b-256")]
    Blake2b256,
}

impl HashAlg {
    /// Wire name of the algorithm.
    pub fn as_str(self) -> &'static str {
        match self {
            HashAlg::Sha256 => "sha256",
            HashAlg::Blake2b256 => "blake2b-256",
        }
    }

    /// Hash the concatenation of `parts`.
    pub fn digest(self, parts: &[&[u8]]) -> [u8; DIGEST_LEN] {
        match self {
            HashAlg::Sha256 => {
                let mut hasher = Sha256::new();
                for part in parts {
                    hasher.update(part);
                }
                hasher.finalize().into()
            }
            HashAlg::Blake2b256 => {
                let mut hasher = Blake2b256::new();
                for part in parts {
                    hasher.update(part);
                }
                hasher.finalize().into()
            }
        }
    }
}

impl fmt::Display for HashAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlg {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sha256" => Ok(HashAlg::Sha256),
            "blake2b-256" => Ok(HashAlg::Blake2b256),
            other => Err(CoreError::UnknownHashAlg(other.to_string())),
        }
    }
}

/// Plain SHA-256, used by the demo signature scheme.
pub fn sha256(parts: &[&[u8]]) -> [u8; 32] {
    HashAlg::Sha256.digest(parts)
}

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let arr = decode_fixed::<32>(s, "public_key")?;
        Ok(Self(arr))
    }

    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<()> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;
        let sig = Signature::from_bytes(&signature.0);
        verifying_key
            .verify(message, &sig)
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}...)", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ed25519Signature(pub [u8; 64]);

impl Ed25519Signature {
    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let arr = decode_fixed::<64>(s, "signature")?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Sig({}...)", &self.to_hex()[..16])
    }
}

/// A device signing keypair.
///
/// Wraps ed25519-dalek's `SigningKey`, which zeroizes its secret on drop.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a new random (ephemeral) keypair.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            signing_key: SigningKey::generate(&mut rng),
        }
    }

    /// Create from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Create from seed bytes of either 32 bytes or 64 bytes.
    ///
    /// A 64-byte value (seed || public key, the libsodium layout) is
    /// truncated to its first 32 bytes.
    pub fn from_seed_bytes(seed: &[u8]) -> Result<Self> {
        match seed.len() {
            32 | 64 => {
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&seed[..32]);
                let keypair = Self::from_seed(&arr);
                arr.fill(0);
                Ok(keypair)
            }
            n => Err(CoreError::InvalidSeed(n)),
        }
    }

    /// Get the public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.signing_key.sign(message).to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({:?})", self.public_key())
    }
}

/// Decode a hex string into exactly `N` bytes.
fn decode_fixed<const N: usize>(s: &str, field: &'static str) -> Result<[u8; N]> {
    let bytes = hex::decode(s).map_err(|e| CoreError::InvalidHex {
        field,
        reason: e.to_string(),
    })?;
    bytes.try_into().map_err(|b: Vec<u8>| CoreError::InvalidHex {
        field,
        reason: format!("expected {} bytes, got {}", N, b.len()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_sign_verify() {
        let keypair = Keypair::generate();
        let message = b"hello world";
        let signature = keypair.sign(message);

        keypair
            .public_key()
            .verify(message, &signature)
            .expect("valid signature should verify");

        let tampered = b"hello worlD";
        assert!(keypair.public_key().verify(tampered, &signature).is_err());
    }

    #[test]
    fn test_keypair_deterministic_from_seed() {
        let seed = [0x42u8; 32];
        let kp1 = Keypair::from_seed(&seed);
        let kp2 = Keypair::from_seed(&seed);
        assert_eq!(kp1.public_key(), kp2.public_key());
    }

    #[test]
    fn test_64_byte_seed_truncated() {
        let mut long = [0x42u8; 64];
        long[40] = 0x99;
        let kp = Keypair::from_seed_bytes(&long).unwrap();
        assert_eq!(kp.public_key(), Keypair::from_seed(&[0x42; 32]).public_key());
        assert!(matches!(
            Keypair::from_seed_bytes(&[0u8; 16]),
            Err(CoreError::InvalidSeed(16))
        ));
    }

    #[test]
    fn test_digest_lengths_match() {
        let a = HashAlg::Sha256.digest(&[b"test"]);
        let b = HashAlg::Blake2b256.digest(&[b"test"]);
        assert_eq!(a.len(), DIGEST_LEN);
        assert_eq!(b.len(), DIGEST_LEN);
        assert_ne!(a, b);
    }

    #[test]
    fn test_digest_concatenates_parts() {
        let whole = HashAlg::Sha256.digest(&[b"chain:v1abc"]);
        let split = HashAlg::Sha256.digest(&[b"chain:v1", b"a", b"bc"]);
        assert_eq!(whole, split);
    }

    #[test]
    fn test_known_sha256_vector() {
        assert_eq!(
            hex::encode(sha256(&[b"abc"])),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_alg_names() {
        assert_eq!("sha256".parse::<HashAlg>().unwrap(), HashAlg::Sha256);
        assert_eq!("blake2b-256".parse::<HashAlg>().unwrap(), HashAlg::Blake2b256);
        assert!("md5".parse::<HashAlg>().is_err());
        assert_eq!(serde_json::to_string(&HashAlg::Blake2b256).unwrap(), "\"blake2b-256\"");
    }

    #[test]
    fn test_public_key_hex_roundtrip() {
        let pk = Keypair::generate().public_key();
        assert_eq!(PublicKey::from_hex(&pk.to_hex()).unwrap(), pk);
        assert!(PublicKey::from_hex("abcd").is_err());
    }
}
