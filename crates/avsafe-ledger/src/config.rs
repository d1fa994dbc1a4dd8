//! Ledger configuration.
//!
//! Configuration is decided once, at startup, and threaded explicitly.
//! Nothing below the facade reads the environment.

use std::fmt;

use avsafe_ledger_core::{
    CoreError, HashAlg, SignatureBackend, SignerConfig, TrustedKeys, VerifyOptions,
};
use rand::RngCore;

use crate::error::{LedgerError, Result};

/// `"1"` enables strict cryptography.
pub const ENV_STRICT_CRYPTO: &str = "AVSAFE_STRICT_CRYPTO";
/// Hex-encoded 32 or 64 byte signing seed.
pub const ENV_PRIV_HEX: &str = "AVSAFE_PRIV_HEX";

/// A 32-byte signing seed. Zeroed on drop, never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Seed([u8; 32]);

impl Seed {
    /// Accepts 32 bytes, or 64 bytes truncated to the first 32.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes.len() {
            32 | 64 => {
                let mut seed = [0u8; 32];
                seed.copy_from_slice(&bytes[..32]);
                Ok(Self(seed))
            }
            n => Err(CoreError::InvalidSeed(n).into()),
        }
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let mut bytes = hex::decode(s.trim()).map_err(|e| CoreError::InvalidHex {
            field: "seed",
            reason: e.to_string(),
        })?;
        let seed = Self::from_bytes(&bytes);
        bytes.fill(0);
        seed
    }

    /// A fresh random seed.
    pub fn random() -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        Self(seed)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Drop for Seed {
    fn drop(&mut self) {
        self.0.fill(0);
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed(<redacted>)")
    }
}

/// Where a chain writer's signing key comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningMode {
    /// A random key per writer. Signatures are valid but the key changes
    /// every session.
    Ephemeral,
    /// A stable device key.
    Seeded(Seed),
}

/// Configuration for the ledger.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Hash for new records. Verification follows each record's own `alg`.
    pub hash_alg: HashAlg,
    /// `None` writes unsigned records.
    pub signing: Option<SigningMode>,
    /// Refuse the demo signature fallback; reject demo and unverifiable signatures.
    pub strict: bool,
    pub backend: SignatureBackend,
    /// Unsigned records fail verification.
    pub require_signatures: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            hash_alg: HashAlg::Sha256,
            signing: Some(SigningMode::Ephemeral),
            strict: false,
            backend: SignatureBackend::Ed25519,
            require_signatures: false,
        }
    }
}

impl LedgerConfig {
    /// Defaults overridden by `AVSAFE_STRICT_CRYPTO` and `AVSAFE_PRIV_HEX`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(flag) = lookup(ENV_STRICT_CRYPTO) {
            config.strict = match flag.trim() {
                "1" => true,
                "" | "0" => false,
                other => {
                    return Err(LedgerError::Config(format!(
                        "{} must be \"0\" or \"1\", got {:?}",
                        ENV_STRICT_CRYPTO, other
                    )))
                }
            };
        }
        if let Some(seed_hex) = lookup(ENV_PRIV_HEX).filter(|s| !s.trim().is_empty()) {
            config.signing = Some(SigningMode::Seeded(Seed::from_hex(&seed_hex)?));
        }
        Ok(config)
    }

    pub fn signer_config(&self) -> SignerConfig {
        SignerConfig {
            backend: self.backend,
            strict: self.strict,
        }
    }

    pub fn verify_options(&self, trusted_keys: TrustedKeys) -> VerifyOptions {
        VerifyOptions {
            backend: self.backend,
            strict: self.strict,
            require_signatures: self.require_signatures,
            trusted_keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = LedgerConfig::from_lookup(lookup(&[])).unwrap();
        assert!(!config.strict);
        assert_eq!(config.signing, Some(SigningMode::Ephemeral));
        assert_eq!(config.hash_alg, HashAlg::Sha256);
    }

    #[test]
    fn test_env_overrides() {
        let seed_hex = "11".repeat(64);
        let config = LedgerConfig::from_lookup(lookup(&[
            (ENV_STRICT_CRYPTO, "1"),
            (ENV_PRIV_HEX, &seed_hex),
        ]))
        .unwrap();
        assert!(config.strict);
        assert_eq!(config.signing, Some(SigningMode::Seeded(Seed([0x11; 32]))));
    }

    #[test]
    fn test_bad_env_values() {
        assert!(matches!(
            LedgerConfig::from_lookup(lookup(&[(ENV_STRICT_CRYPTO, "yes")])),
            Err(LedgerError::Config(_))
        ));
        assert!(matches!(
            LedgerConfig::from_lookup(lookup(&[(ENV_PRIV_HEX, "abcd")])),
            Err(LedgerError::Core(CoreError::InvalidSeed(2)))
        ));
        assert!(matches!(
            LedgerConfig::from_lookup(lookup(&[(ENV_PRIV_HEX, "xyz")])),
            Err(LedgerError::Core(CoreError::InvalidHex { .. }))
        ));
    }

    #[test]
    fn test_seed_debug_is_redacted() {
        let seed = Seed::random();
        assert_eq!(format!("{:?}", seed), "Seed(<redacted>)");
        assert_ne!(Seed::random(), seed);
    }
}
