use super::{parse_token_response, require_variables, Authenticator, CachedToken};
use crate::config::{
    EnvConfig, ENV_AZURE_AD_RESOURCE, ENV_AZURE_CLIENT_ID, ENV_AZURE_CLIENT_SECRET,
    ENV_AZURE_ENVIRONMENT, ENV_AZURE_TENANT_ID,
};
use crate::http::{HttpClient, HttpClientFactory};
use crate::models::ArmMetadata;
use crate::KeyVaultError;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

const DEFAULT_ARM_URL: &str =
    "https://management.azure.com/metadata/endpoints?api-version=2020-01-01";
const DEFAULT_CLOUD_NAME: &str = "AzureCloud";

/// Service principal login using a client secret from the environment.
///
/// The login endpoint is discovered from the ARM metadata document for the
/// configured cloud. The token is cached for the lifetime of the instance.
pub struct ClientCredentialsEnvironmentAuthenticator {
    client: HttpClient,
    cloud_name: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    resource: String,
    cache: Mutex<Option<CachedToken>>,
}

impl ClientCredentialsEnvironmentAuthenticator {
    pub fn new(
        http: &HttpClientFactory,
        config: &EnvConfig,
        resource: &str,
    ) -> Result<Self, KeyVaultError> {
        let arm_url = config.ad_resource.clone().unwrap_or_else(|| {
            tracing::debug!(
                "{} environment variable is not specified, falling back to default.",
                ENV_AZURE_AD_RESOURCE
            );
            DEFAULT_ARM_URL.to_string()
        });
        let cloud_name = config.environment.clone().unwrap_or_else(|| {
            tracing::debug!(
                "{} environment variable is not specified, falling back to default.",
                ENV_AZURE_ENVIRONMENT
            );
            DEFAULT_CLOUD_NAME.to_string()
        });

        Ok(Self {
            client: http.client(&arm_url)?,
            cloud_name,
            tenant_id: config.tenant_id.clone().unwrap_or_default(),
            client_id: config.client_id.clone().unwrap_or_default(),
            client_secret: config.client_secret.clone().unwrap_or_default(),
            resource: resource.to_string(),
            cache: Mutex::new(None),
        })
    }

    async fn get_metadata(&self) -> Result<ArmMetadata, KeyVaultError> {
        let request = self.client.get(self.client.base_url().as_str())?;
        let response = self
            .client
            .send(request)
            .await
            .map_err(|e| KeyVaultError::transport("Failed to get instance metadata", e))?;

        let metadata = response.json().map_err(|e| {
            KeyVaultError::InvalidResponse(format!(
                "Failed to get instance metadata: {}: {}",
                e, response.body
            ))
        })?;
        let entries = metadata.as_array().ok_or_else(|| {
            KeyVaultError::InvalidResponse(format!("Invalid metadata contents: {}", metadata))
        })?;

        // Duplicated cloud names resolve to the last entry
        let cloud = entries
            .iter()
            .rev()
            .find(|entry| {
                entry.get("name").and_then(Value::as_str) == Some(self.cloud_name.as_str())
            })
            .ok_or_else(|| KeyVaultError::CloudNotFound {
                cloud: self.cloud_name.clone(),
                metadata: metadata.to_string(),
            })?;

        ArmMetadata::from_value(cloud)
    }

    async fn authenticate(&self, metadata: &ArmMetadata) -> Result<String, KeyVaultError> {
        let url = format!("{}{}/oauth2/token", metadata.login_endpoint(), self.tenant_id);
        let request = self.client.post(&url)?.form(&[
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("resource", self.resource.as_str()),
        ]);

        let response = self
            .client
            .send(request)
            .await
            .map_err(|e| KeyVaultError::transport("Failed to get authentication token", e))?;
        let token = parse_token_response(&response.body)?;

        tracing::info!("Successfully authenticated using client credentials.");
        Ok(token.access_token)
    }
}

#[async_trait]
impl Authenticator for ClientCredentialsEnvironmentAuthenticator {
    async fn check_usability(&self) -> Result<(), KeyVaultError> {
        require_variables(&[
            (ENV_AZURE_TENANT_ID, self.tenant_id.as_str()),
            (ENV_AZURE_CLIENT_ID, self.client_id.as_str()),
            (ENV_AZURE_CLIENT_SECRET, self.client_secret.as_str()),
        ])
    }

    async fn get_authentication_token(&self) -> Result<String, KeyVaultError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            return Ok(cached.token.clone());
        }

        let metadata = self.get_metadata().await?;
        let token = self.authenticate(&metadata).await?;
        *cache = Some(CachedToken::permanent(token.clone()));
        Ok(token)
    }

    fn name(&self) -> &'static str {
        "ClientCredentialsEnvironmentAuthenticator"
    }
}
