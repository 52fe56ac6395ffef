mod keys;
mod metadata;
mod secrets;

pub use keys::{DecryptRequest, EncryptRequest, EncryptionAlgorithm, KeyOperationResult};
pub use metadata::ArmMetadata;
pub use secrets::{
    DeletedSecretBundle, RecoveryLevel, SecretAttributes, SecretBundle, SecretItem,
    SecretListResult, SetSecretRequest,
};

use crate::KeyVaultError;
use serde::de::DeserializeOwned;

/// Deserializes a response document, reporting the whole document on failure.
fn parse<T: DeserializeOwned>(type_name: &str, value: &serde_json::Value) -> Result<T, KeyVaultError> {
    T::deserialize(value)
        .map_err(|_| KeyVaultError::InvalidResponse(format!("{} is invalid: {}", type_name, value)))
}

/// Segment of a resource id counted from the end (`0` is the last one).
fn id_segment(id: &str, from_end: usize, min_parts: usize) -> Result<&str, KeyVaultError> {
    let parts: Vec<&str> = id.split('/').collect();
    if parts.len() < min_parts {
        return Err(KeyVaultError::InvalidResponse(format!(
            "Invalid secret ID format \"{}\".",
            id
        )));
    }
    Ok(parts[parts.len() - 1 - from_end])
}
