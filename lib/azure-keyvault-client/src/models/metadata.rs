use crate::KeyVaultError;
use serde_json::Value;

/// Endpoints of one cloud taken from the ARM metadata document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmMetadata {
    name: String,
    login_endpoint: String,
    key_vault_dns: Option<String>,
}

impl ArmMetadata {
    pub fn from_value(data: &Value) -> Result<Self, KeyVaultError> {
        let name = non_empty(data.get("name")).ok_or_else(|| missing("name", data))?;
        let login_endpoint = non_empty(data.pointer("/authentication/loginEndpoint"))
            .ok_or_else(|| missing("authentication.loginEndpoint", data))?;
        let key_vault_dns = non_empty(data.pointer("/suffixes/keyVaultDns"));

        Ok(Self {
            name,
            login_endpoint,
            key_vault_dns,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn login_endpoint(&self) -> &str {
        &self.login_endpoint
    }

    pub fn key_vault_dns(&self) -> Option<&str> {
        self.key_vault_dns.as_deref()
    }
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn missing(field: &str, data: &Value) -> KeyVaultError {
    KeyVaultError::InvalidResponse(format!(
        "\"{}\" field not found in API response: {}",
        field, data
    ))
}
