//! Records: a descriptor payload sealed with its chain block.
//!
//! A record is created once, when the producer emits it, and is never
//! mutated afterwards. On the wire it is the flat JSON object
//! `payload ∪ {"chain": ChainBlock}`.

use serde::de;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::crypto::HashAlg;
use crate::error::{CoreError, Result};
use crate::value::{Object, Value};

/// The key reserved for the chain block.
pub const CHAIN_KEY: &str = "chain";

/// An immutable descriptor payload: an object that never carries `chain`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Payload(Object);

impl Payload {
    /// Wrap an object, rejecting the reserved `chain` key.
    pub fn new(map: Object) -> Result<Self> {
        if map.contains_key(CHAIN_KEY) {
            return Err(CoreError::ReservedKey(CHAIN_KEY));
        }
        Ok(Self(map))
    }

    /// Look up a top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Look up a nested field by path, e.g. `["audio", "laeq_db"]`.
    pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        rest.iter().try_fold(self.0.get(*first)?, |v, key| v.get(key))
    }

    /// The `device_id` field, if it is a string.
    pub fn device_id(&self) -> Option<&str> {
        self.get("device_id").and_then(Value::as_str)
    }

    pub fn as_object(&self) -> &Object {
        &self.0
    }

    pub fn into_object(self) -> Object {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Value> for Payload {
    type Error = CoreError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Payload::new(map),
            other => Err(CoreError::MalformedRecord(format!(
                "payload must be an object, got {}",
                kind_name(&other)
            ))),
        }
    }
}

impl TryFrom<serde_json::Value> for Payload {
    type Error = CoreError;

    fn try_from(json: serde_json::Value) -> Result<Self> {
        Payload::try_from(Value::from(json))
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let map = Object::deserialize(deserializer)?;
        Payload::new(map).map_err(de::Error::custom)
    }
}

/// Signature scheme named in a signature block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureScheme {
    #[serde(rename = "ed25519")]
    Ed25519,
    /// `SHA256(secret || message)`. NOT a cryptographic signature; exists so a
    /// development pipeline can run without key material.
    #[serde(rename = "sha256-demo")]
    Sha256Demo,
    /// Any scheme this build does not recognize.
    #[serde(rename = "unknown", other)]
    Unknown,
}

impl SignatureScheme {
    pub fn as_str(self) -> &'static str {
        match self {
            SignatureScheme::Ed25519 => "ed25519",
            SignatureScheme::Sha256Demo => "sha256-demo",
            SignatureScheme::Unknown => "unknown",
        }
    }
}

/// A signature over `SIGN_DOMAIN || canonical(payload)`.
///
/// Hex fields are kept as received; they are decoded at verification time
/// so that a garbled block is classified rather than rejected on parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBlock {
    pub scheme: SignatureScheme,
    pub signature: String,
    #[serde(default)]
    pub public_key: Option<String>,
}

/// The chain block attached to every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainBlock {
    #[serde(default)]
    pub alg: HashAlg,
    pub hash: String,
    #[serde(default)]
    pub prev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureBlock>,
}

/// A sealed record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    payload: Payload,
    chain: ChainBlock,
}

impl Record {
    /// Assemble a record from its parts. No hashing is done here; use
    /// [`crate::chain::make_record`] to seal a new payload.
    pub fn from_parts(payload: Payload, chain: ChainBlock) -> Self {
        Self { payload, chain }
    }

    /// Lift one parsed wire object into a record.
    pub fn from_value(value: Value) -> Result<Self> {
        let mut map = match value {
            Value::Object(map) => map,
            other => {
                return Err(CoreError::MalformedRecord(format!(
                    "record must be an object, got {}",
                    kind_name(&other)
                )))
            }
        };
        let chain_value = map
            .remove(CHAIN_KEY)
            .ok_or_else(|| CoreError::MalformedRecord("missing chain block".into()))?;
        let json = serde_json::to_value(&chain_value)
            .map_err(|e| CoreError::MalformedRecord(e.to_string()))?;
        let chain: ChainBlock = serde_json::from_value(json)
            .map_err(|e| CoreError::MalformedRecord(format!("chain block: {}", e)))?;
        Ok(Self {
            payload: Payload(map),
            chain,
        })
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn chain(&self) -> &ChainBlock {
        &self.chain
    }

    /// The stored chain hash.
    pub fn hash(&self) -> &str {
        &self.chain.hash
    }

    pub fn signature(&self) -> Option<&SignatureBlock> {
        self.chain.signature.as_ref()
    }

    pub fn into_parts(self) -> (Payload, ChainBlock) {
        (self.payload, self.chain)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let fields = self.payload.as_object();
        let mut map = serializer.serialize_map(Some(fields.len() + 1))?;
        let mut chain_written = false;
        for (k, v) in fields {
            if !chain_written && k.as_str() > CHAIN_KEY {
                map.serialize_entry(CHAIN_KEY, &self.chain)?;
                chain_written = true;
            }
            map.serialize_entry(k, v)?;
        }
        if !chain_written {
            map.serialize_entry(CHAIN_KEY, &self.chain)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Record::from_value(value).map_err(de::Error::custom)
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Int(_) | Value::UInt(_) | Value::Float(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
