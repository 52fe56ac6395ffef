mod client_credentials;
mod factory;
mod federated;
mod managed;
mod token;
mod token_info;

pub use client_credentials::ClientCredentialsEnvironmentAuthenticator;
pub use factory::{AuthenticatorConstructor, AuthenticatorFactory};
pub use federated::FederatedTokenAuthenticator;
pub use managed::ManagedCredentialsAuthenticator;
pub use token::StaticTokenAuthenticator;
pub use token_info::CachedToken;

use crate::KeyVaultError;
use async_trait::async_trait;
use serde_json::Value;

/// A way of obtaining AAD bearer tokens for one resource.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Fails when this strategy cannot work in the current environment.
    async fn check_usability(&self) -> Result<(), KeyVaultError>;

    /// Bearer token for the bound resource, cached according to the
    /// implementation's policy.
    async fn get_authentication_token(&self) -> Result<String, KeyVaultError>;

    /// Name used in diagnostics
    fn name(&self) -> &'static str;
}

/// Reports every empty variable in one error.
pub(crate) fn require_variables(variables: &[(&str, &str)]) -> Result<(), KeyVaultError> {
    let errors: Vec<String> = variables
        .iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| format!("Environment variable \"{}\" is not set.", name))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(KeyVaultError::Configuration(errors.join(" ")))
    }
}

#[derive(Debug)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds, when the server reported one
    pub expires_in: Option<i64>,
}

pub(crate) fn parse_token_response(body: &str) -> Result<TokenResponse, KeyVaultError> {
    let data: Value = serde_json::from_str(body).map_err(|e| {
        KeyVaultError::InvalidResponse(format!("Malformed token response ({}): {}", e, body))
    })?;

    let access_token = match data.get("access_token") {
        Some(Value::String(token)) if !token.is_empty() => token.clone(),
        Some(Value::Number(token)) => token.to_string(),
        _ => {
            return Err(KeyVaultError::InvalidResponse(format!(
                "Access token not provided in response: {}",
                data
            )));
        }
    };

    // v1 endpoints report numbers as strings
    let expires_in = match data.get("expires_in") {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };

    Ok(TokenResponse {
        access_token,
        expires_in,
    })
}
