//! Payload signing and signature checks.
//!
//! The backend is chosen once, when a [`Signer`] is configured. With the
//! Ed25519 backend every signature is a real Ed25519 signature. Without it,
//! a permissive signer falls back to the `sha256-demo` MAC and a strict one
//! refuses to sign.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::canonical::canonical_payload;
use crate::crypto::{sha256, Ed25519Signature, Keypair, PublicKey};
use crate::error::{CoreError, Result};
use crate::record::{Payload, SignatureBlock, SignatureScheme};

/// Domain tag prefixed to every signed message.
pub const SIGN_DOMAIN: &[u8] = b"avsafe:sign:v1";

/// Secret the demo MAC is checked against.
pub const DEMO_SECRET: &[u8] = b"demo-secret";

/// Signature capability available to this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureBackend {
    /// Native Ed25519.
    #[default]
    Ed25519,
    /// No signature library; only the demo MAC can be produced.
    Unavailable,
}

/// Signer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignerConfig {
    pub backend: SignatureBackend,
    /// Forbid the demo fallback and reject demo signatures.
    pub strict: bool,
}

/// Signs and verifies messages under a fixed backend policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Signer {
    config: SignerConfig,
}

impl Signer {
    pub fn new(config: SignerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignerConfig {
        &self.config
    }

    /// Sign raw message bytes.
    ///
    /// With the Ed25519 backend, `seed` (32 bytes, or 64 bytes truncated to
    /// 32) derives the key; without a seed an ephemeral key is generated.
    pub fn sign(&self, message: &[u8], seed: Option<&[u8]>) -> Result<SignatureBlock> {
        match self.config.backend {
            SignatureBackend::Ed25519 => {
                let keypair = match seed {
                    Some(bytes) => Keypair::from_seed_bytes(bytes)?,
                    None => Keypair::generate(),
                };
                Ok(SignatureBlock {
                    scheme: SignatureScheme::Ed25519,
                    signature: keypair.sign(message).to_hex(),
                    public_key: Some(keypair.public_key().to_hex()),
                })
            }
            SignatureBackend::Unavailable if self.config.strict => {
                Err(CoreError::CryptoUnavailable)
            }
            SignatureBackend::Unavailable => {
                warn!("no Ed25519 backend, emitting NON-CRYPTOGRAPHIC sha256-demo signature");
                let secret = seed.map(hex::encode);
                let secret = secret.as_deref().map_or(DEMO_SECRET, str::as_bytes);
                Ok(SignatureBlock {
                    scheme: SignatureScheme::Sha256Demo,
                    signature: demo_mac(secret, message),
                    public_key: None,
                })
            }
        }
    }

    /// Sign `SIGN_DOMAIN || canonical(payload)`.
    pub fn sign_payload(&self, payload: &Payload, seed: Option<&[u8]>) -> Result<SignatureBlock> {
        let message = signing_message(payload)?;
        self.sign(&message, seed)
    }

    /// Check a signature. Never fails: any malformed input, mismatch,
    /// unknown scheme or missing backend yields `false`.
    pub fn verify(
        &self,
        message: &[u8],
        signature_hex: &str,
        public_key_hex: Option<&str>,
        scheme: SignatureScheme,
    ) -> bool {
        match scheme {
            SignatureScheme::Ed25519 => {
                if self.config.backend == SignatureBackend::Unavailable {
                    return false;
                }
                let Some(pk_hex) = public_key_hex else {
                    return false;
                };
                match (PublicKey::from_hex(pk_hex), Ed25519Signature::from_hex(signature_hex)) {
                    (Ok(pk), Ok(sig)) => pk.verify(message, &sig).is_ok(),
                    _ => false,
                }
            }
            SignatureScheme::Sha256Demo => {
                !self.config.strict
                    && demo_mac(DEMO_SECRET, message).eq_ignore_ascii_case(signature_hex)
            }
            SignatureScheme::Unknown => false,
        }
    }

    /// Check a signature block against a payload.
    pub fn verify_payload(&self, payload: &Payload, block: &SignatureBlock) -> bool {
        match signing_message(payload) {
            Ok(message) => self.verify(
                &message,
                &block.signature,
                block.public_key.as_deref(),
                block.scheme,
            ),
            Err(_) => false,
        }
    }
}

/// The exact bytes a payload signature covers.
pub fn signing_message(payload: &Payload) -> Result<Vec<u8>> {
    let body = canonical_payload(payload)?;
    let mut message = Vec::with_capacity(SIGN_DOMAIN.len() + body.len());
    message.extend_from_slice(SIGN_DOMAIN);
    message.extend_from_slice(&body);
    Ok(message)
}

fn demo_mac(secret: &[u8], message: &[u8]) -> String {
    hex::encode(sha256(&[secret, message]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use serde_json::json;

    const SEED: [u8; 32] = [7u8; 32];

    fn payload() -> Payload {
        Payload::try_from(json!({"idx": 4, "device_id": "dev-1"})).unwrap()
    }

    fn unavailable(strict: bool) -> Signer {
        Signer::new(SignerConfig {
            backend: SignatureBackend::Unavailable,
            strict,
        })
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let signer = Signer::default();
        let block = signer.sign(b"minute", Some(&SEED)).unwrap();
        assert_eq!(block.scheme, SignatureScheme::Ed25519);
        let pk = Keypair::from_seed(&SEED).public_key().to_hex();
        assert_eq!(block.public_key.as_deref(), Some(pk.as_str()));

        assert!(signer.verify(b"minute", &block.signature, Some(&pk), SignatureScheme::Ed25519));
        assert!(!signer.verify(b"minutE", &block.signature, Some(&pk), SignatureScheme::Ed25519));
    }

    #[test]
    fn test_seeded_signature_is_deterministic() {
        let signer = Signer::default();
        let a = signer.sign(b"m", Some(&SEED)).unwrap();
        let b = signer.sign(b"m", Some(&SEED)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_ephemeral_keys_differ() {
        let signer = Signer::default();
        let a = signer.sign(b"m", None).unwrap();
        let b = signer.sign(b"m", None).unwrap();
        assert_ne!(a.public_key, b.public_key);
        assert!(signer.verify(b"m", &a.signature, a.public_key.as_deref(), a.scheme));
    }

    #[test]
    fn test_bad_seed_length() {
        let err = Signer::default().sign(b"m", Some(&[1u8; 31])).unwrap_err();
        assert!(matches!(err, CoreError::InvalidSeed(31)));
    }

    #[test]
    fn test_verify_malformed_inputs_are_false() {
        let signer = Signer::default();
        let block = signer.sign(b"m", Some(&SEED)).unwrap();
        let pk = block.public_key.clone();
        assert!(!signer.verify(b"m", "not-hex", pk.as_deref(), SignatureScheme::Ed25519));
        assert!(!signer.verify(b"m", &block.signature, Some("abcd"), SignatureScheme::Ed25519));
        assert!(!signer.verify(b"m", &block.signature, None, SignatureScheme::Ed25519));
        assert!(!signer.verify(b"m", &block.signature, pk.as_deref(), SignatureScheme::Unknown));
    }

    #[test]
    fn test_ed25519_without_backend_is_false() {
        let block = Signer::default().sign(b"m", Some(&SEED)).unwrap();
        let signer = unavailable(false);
        assert!(!signer.verify(b"m", &block.signature, block.public_key.as_deref(), block.scheme));
    }

    #[test]
    fn test_demo_fallback_when_permissive() {
        let signer = unavailable(false);
        let block = signer.sign(b"m", None).unwrap();
        assert_eq!(block.scheme, SignatureScheme::Sha256Demo);
        assert_eq!(block.public_key, None);
        assert_eq!(block.signature, hex::encode(sha256(&[b"demo-secret", b"m"])));
        assert!(signer.verify(b"m", &block.signature, None, block.scheme));
        assert!(!signer.verify(b"x", &block.signature, None, block.scheme));
    }

    #[test]
    fn test_demo_with_seed_uses_seed_hex_as_secret() {
        let block = unavailable(false).sign(b"m", Some(&SEED)).unwrap();
        let secret = hex::encode(SEED);
        assert_eq!(block.signature, hex::encode(sha256(&[secret.as_bytes(), b"m"])));
        // Only the default secret is checkable.
        assert!(!unavailable(false).verify(b"m", &block.signature, None, block.scheme));
    }

    #[test]
    fn test_strict_without_backend_refuses() {
        let err = unavailable(true).sign(b"m", None).unwrap_err();
        assert!(matches!(err, CoreError::CryptoUnavailable));
    }

    #[test]
    fn test_strict_rejects_demo_signatures() {
        let block = unavailable(false).sign(b"m", None).unwrap();
        let strict = Signer::new(SignerConfig {
            backend: SignatureBackend::Ed25519,
            strict: true,
        });
        assert!(!strict.verify(b"m", &block.signature, None, block.scheme));
    }

    #[test]
    fn test_sign_payload_is_domain_separated() {
        let signer = Signer::default();
        let p = payload();
        let block = signer.sign_payload(&p, Some(&SEED)).unwrap();
        assert!(signer.verify_payload(&p, &block));

        let body = crate::canonical::canonicalize(&Value::Object(p.as_object().clone())).unwrap();
        assert!(!signer.verify(&body, &block.signature, block.public_key.as_deref(), block.scheme));
    }
}
