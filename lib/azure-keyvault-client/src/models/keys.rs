use super::parse;
use crate::{base64url, KeyVaultError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncryptionAlgorithm {
    #[serde(rename = "RSA-OAEP")]
    RsaOaep,
    #[serde(rename = "RSA-OAEP-256")]
    RsaOaep256,
    #[serde(rename = "RSA1_5")]
    Rsa15,
}

impl EncryptionAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RsaOaep => "RSA-OAEP",
            Self::RsaOaep256 => "RSA-OAEP-256",
            Self::Rsa15 => "RSA1_5",
        }
    }
}

impl fmt::Display for EncryptionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncryptionAlgorithm {
    type Err = KeyVaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RSA-OAEP" => Ok(Self::RsaOaep),
            "RSA-OAEP-256" => Ok(Self::RsaOaep256),
            "RSA1_5" => Ok(Self::Rsa15),
            _ => Err(KeyVaultError::InvalidArgument(format!(
                "Invalid algorithm \"{}\"",
                s
            ))),
        }
    }
}

/// Plaintext to encrypt; sent base64url-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncryptRequest {
    pub alg: EncryptionAlgorithm,
    #[serde(serialize_with = "base64url::serialize")]
    pub value: Vec<u8>,
}

impl EncryptRequest {
    pub fn new(alg: EncryptionAlgorithm, value: impl Into<Vec<u8>>) -> Self {
        Self {
            alg,
            value: value.into(),
        }
    }
}

/// Ciphertext to decrypt, already base64url-encoded as returned by `encrypt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecryptRequest {
    pub alg: EncryptionAlgorithm,
    pub value: String,
}

impl DecryptRequest {
    pub fn new(alg: EncryptionAlgorithm, value: impl Into<String>) -> Self {
        Self {
            alg,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeyOperationResult {
    pub kid: String,
    pub value: String,
}

impl KeyOperationResult {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, KeyVaultError> {
        parse("KeyOperationResult", value)
    }

    pub fn decoded_value(&self) -> Result<Vec<u8>, KeyVaultError> {
        base64url::decode(&self.value).map_err(|e| {
            KeyVaultError::InvalidResponse(format!(
                "KeyOperationResult value \"{}\" is not valid base64url: {}",
                self.value, e
            ))
        })
    }
}
