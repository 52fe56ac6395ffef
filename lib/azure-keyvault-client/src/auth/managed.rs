use super::{parse_token_response, Authenticator, CachedToken};
use crate::config::EnvConfig;
use crate::http::{HttpClient, HttpClientFactory};
use crate::KeyVaultError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;

const DEFAULT_IMDS_ENDPOINT: &str = "http://169.254.169.254/";
const API_VERSION: &str = "2019-11-01";
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const PROBE_MAX_RETRIES: u32 = 1;

/// Managed identity through the Instance Metadata Service of the host VM.
pub struct ManagedCredentialsAuthenticator {
    client: HttpClient,
    probe: HttpClient,
    resource: String,
    cache: Mutex<Option<CachedToken>>,
}

impl ManagedCredentialsAuthenticator {
    pub fn new(
        http: &HttpClientFactory,
        config: &EnvConfig,
        resource: &str,
    ) -> Result<Self, KeyVaultError> {
        let endpoint = config
            .imds_endpoint
            .as_deref()
            .unwrap_or(DEFAULT_IMDS_ENDPOINT);
        let probe_options = http
            .defaults()
            .clone()
            .with_max_retries(PROBE_MAX_RETRIES)
            .with_timeout(PROBE_TIMEOUT);

        Ok(Self {
            client: http.client(endpoint)?,
            probe: http.client_with(endpoint, probe_options)?,
            resource: resource.to_string(),
            cache: Mutex::new(None),
        })
    }

    async fn authenticate(&self) -> Result<String, KeyVaultError> {
        let request = self
            .client
            .get("/metadata/identity/oauth2/token")?
            .query(&[
                ("api-version", API_VERSION),
                ("format", "text"),
                ("resource", self.resource.as_str()),
            ])
            .header("Metadata", "true");

        let response = self
            .client
            .send(request)
            .await
            .map_err(|e| KeyVaultError::transport("Failed to get authentication token", e))?;
        let token = parse_token_response(&response.body)?;

        tracing::info!("Successfully authenticated using instance metadata.");
        Ok(token.access_token)
    }
}

#[async_trait]
impl Authenticator for ManagedCredentialsAuthenticator {
    async fn check_usability(&self) -> Result<(), KeyVaultError> {
        let request = self
            .probe
            .get("/metadata")?
            .query(&[("api-version", API_VERSION), ("format", "text")])
            .header("Metadata", "true");

        self.probe
            .send(request)
            .await
            .map(|_| ())
            .map_err(|e| KeyVaultError::transport("Instance metadata service not available", e))
    }

    async fn get_authentication_token(&self) -> Result<String, KeyVaultError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            return Ok(cached.token.clone());
        }

        let token = self.authenticate().await?;
        *cache = Some(CachedToken::permanent(token.clone()));
        Ok(token)
    }

    fn name(&self) -> &'static str {
        "ManagedCredentialsAuthenticator"
    }
}
