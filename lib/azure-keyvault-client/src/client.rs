use crate::auth::{Authenticator, AuthenticatorFactory};
use crate::config::EnvConfig;
use crate::error::KeyVaultError;
use crate::http::{HttpClient, HttpClientFactory, HttpError};
use crate::models::{
    DecryptRequest, DeletedSecretBundle, EncryptRequest, KeyOperationResult, SecretBundle,
    SecretItem, SecretListResult, SetSecretRequest,
};
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;

const API_VERSION: &str = "7.0";
const VAULT_RESOURCE: &str = "https://vault.azure.net";
pub const DEFAULT_PAGE_SIZE: u32 = 25;

pub struct KeyVaultClientBuilder {
    vault_url: Option<String>,
    http_factory: HttpClientFactory,
    authenticator_factory: AuthenticatorFactory,
    config: Option<EnvConfig>,
    authenticator: Option<Arc<dyn Authenticator>>,
}

impl Default for KeyVaultClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyVaultClientBuilder {
    pub fn new() -> Self {
        Self {
            vault_url: None,
            http_factory: HttpClientFactory::new(),
            authenticator_factory: AuthenticatorFactory::new(),
            config: None,
            authenticator: None,
        }
    }

    /// e.g. `https://my-vault.vault.azure.net`
    pub fn vault_url(mut self, url: impl Into<String>) -> Self {
        self.vault_url = Some(url.into());
        self
    }

    pub fn http_factory(mut self, factory: HttpClientFactory) -> Self {
        self.http_factory = factory;
        self
    }

    pub fn authenticator_factory(mut self, factory: AuthenticatorFactory) -> Self {
        self.authenticator_factory = factory;
        self
    }

    /// Defaults to a snapshot of the process environment.
    pub fn env_config(mut self, config: EnvConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Skips authenticator selection.
    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    pub async fn build(self) -> Result<KeyVaultClient, KeyVaultError> {
        let mut vault_url = self
            .vault_url
            .ok_or_else(|| KeyVaultError::Configuration("Vault URL is not set.".to_string()))?;
        // Relative request paths must resolve below the vault URL
        if !vault_url.ends_with('/') {
            vault_url.push('/');
        }
        let http = self.http_factory.client(&vault_url)?;

        let authenticator = match self.authenticator {
            Some(authenticator) => authenticator,
            None => {
                let config = self.config.unwrap_or_else(EnvConfig::from_env);
                self.authenticator_factory
                    .get_authenticator(&self.http_factory, &config, VAULT_RESOURCE)
                    .await?
                    .into()
            }
        };

        Ok(KeyVaultClient {
            http,
            authenticator,
        })
    }
}

/// Key Vault REST client for key operations and secrets.
pub struct KeyVaultClient {
    http: HttpClient,
    authenticator: Arc<dyn Authenticator>,
}

impl KeyVaultClient {
    pub fn builder() -> KeyVaultClientBuilder {
        KeyVaultClientBuilder::new()
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub async fn encrypt(
        &self,
        request: &EncryptRequest,
        key_name: &str,
        key_version: &str,
    ) -> Result<KeyOperationResult, KeyVaultError> {
        let path = format!(
            "keys/{}/{}/encrypt?api-version={}",
            key_name, key_version, API_VERSION
        );
        let data = self
            .send_request(Method::POST, &path, Some(serde_json::to_value(request)?))
            .await?;
        KeyOperationResult::from_value(&data)
    }

    pub async fn decrypt(
        &self,
        request: &DecryptRequest,
        key_name: &str,
        key_version: &str,
    ) -> Result<KeyOperationResult, KeyVaultError> {
        let path = format!(
            "keys/{}/{}/decrypt?api-version={}",
            key_name, key_version, API_VERSION
        );
        let data = self
            .send_request(Method::POST, &path, Some(serde_json::to_value(request)?))
            .await?;
        KeyOperationResult::from_value(&data)
    }

    pub async fn set_secret(
        &self,
        request: &SetSecretRequest,
        secret_name: &str,
    ) -> Result<SecretBundle, KeyVaultError> {
        let path = format!("secrets/{}?api-version={}", secret_name, API_VERSION);
        let data = self
            .send_request(Method::PUT, &path, Some(serde_json::to_value(request)?))
            .await?;
        SecretBundle::from_value(&data)
    }

    /// Latest version unless `secret_version` is given.
    pub async fn get_secret(
        &self,
        secret_name: &str,
        secret_version: Option<&str>,
    ) -> Result<SecretBundle, KeyVaultError> {
        let path = match secret_version {
            Some(version) => format!(
                "secrets/{}/{}?api-version={}",
                secret_name, version, API_VERSION
            ),
            None => format!("secrets/{}?api-version={}", secret_name, API_VERSION),
        };
        let data = self.send_request(Method::GET, &path, None).await?;
        SecretBundle::from_value(&data)
    }

    /// First page of the secret listing.
    pub async fn get_secrets(&self, max_results: u32) -> Result<SecretListResult, KeyVaultError> {
        let path = format!(
            "secrets/?maxresults={}&api-version={}",
            max_results, API_VERSION
        );
        let data = self.send_request(Method::GET, &path, None).await?;
        SecretListResult::from_value(&data)
    }

    /// Every secret in the vault, following `nextLink` across pages.
    pub async fn get_all_secrets(&self, page_size: u32) -> Result<Vec<SecretItem>, KeyVaultError> {
        let mut page = self.get_secrets(page_size).await?;
        let mut items = std::mem::take(&mut page.value);

        while let Some(next_link) = page.next_link.take().filter(|link| !link.is_empty()) {
            let data = self.send_request(Method::GET, &next_link, None).await?;
            page = SecretListResult::from_value(&data)?;
            items.append(&mut page.value);
        }

        Ok(items)
    }

    pub async fn delete_secret(
        &self,
        secret_name: &str,
    ) -> Result<DeletedSecretBundle, KeyVaultError> {
        let path = format!("secrets/{}?api-version={}", secret_name, API_VERSION);
        let data = self.send_request(Method::DELETE, &path, None).await?;
        DeletedSecretBundle::from_value(&data)
    }

    async fn send_request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, KeyVaultError> {
        let token = self.authenticator.get_authentication_token().await?;

        let mut request = self.http.request(method, path)?.bearer_auth(token);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = self.http.send(request).await.map_err(map_request_error)?;
        response.json().map_err(|e| {
            KeyVaultError::InvalidResponse(format!("Malformed response ({}): {}", e, response.body))
        })
    }
}

/// Prefers the service's own error description over the HTTP error text.
fn map_request_error(error: HttpError) -> KeyVaultError {
    let message = match (error.status(), error.body()) {
        (Some(_), Some(body)) => api_error_message(body),
        _ => None,
    };

    match (message, error.status()) {
        (Some(message), Some(status)) => KeyVaultError::Api {
            status: status.as_u16(),
            message,
            source: error,
        },
        _ => KeyVaultError::Transport {
            message: error.to_string().trim().to_string(),
            source: error,
        },
    }
}

fn api_error_message(body: &str) -> Option<String> {
    let data: Value = serde_json::from_str(body).ok()?;

    match data.get("error")? {
        Value::Object(error) => {
            let code = non_empty(error.get("code"))?;
            let message = non_empty(error.get("message"))?;
            Some(format!("{}: {}", code, message).trim().to_string())
        }
        error => {
            let text = non_empty(Some(error))?;
            Some(format!("Request failed with error: {}", text).trim().to_string())
        }
    }
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}
