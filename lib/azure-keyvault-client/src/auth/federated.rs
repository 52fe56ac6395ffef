use super::{parse_token_response, require_variables, Authenticator, CachedToken};
use crate::config::{
    EnvConfig, ENV_AZURE_AUTHORITY_HOST, ENV_AZURE_CLIENT_ID, ENV_AZURE_FEDERATED_TOKEN_FILE,
    ENV_AZURE_TENANT_ID,
};
use crate::http::{HttpClient, HttpClientFactory};
use crate::KeyVaultError;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;

const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";
const DEFAULT_EXPIRES_IN: i64 = 3600;
const TOKEN_REFRESH_BUFFER_SECS: i64 = 300;

/// Workload identity federation: exchanges the projected service account
/// token in `AZURE_FEDERATED_TOKEN_FILE` for an AAD access token.
///
/// The token file is re-read on every refresh since the kubelet rotates it.
pub struct FederatedTokenAuthenticator {
    client: HttpClient,
    authority_host: String,
    tenant_id: String,
    client_id: String,
    token_file: String,
    resource: String,
    cache: Mutex<Option<CachedToken>>,
}

impl FederatedTokenAuthenticator {
    pub fn new(
        http: &HttpClientFactory,
        config: &EnvConfig,
        resource: &str,
    ) -> Result<Self, KeyVaultError> {
        let authority_host = match config.authority_host.as_deref() {
            Some(host) => host.trim_end_matches('/').to_string(),
            None => {
                tracing::debug!(
                    "{} environment variable is not specified, falling back to default.",
                    ENV_AZURE_AUTHORITY_HOST
                );
                DEFAULT_AUTHORITY_HOST.to_string()
            }
        };

        Ok(Self {
            client: http.client(&authority_host)?,
            authority_host,
            tenant_id: config.tenant_id.clone().unwrap_or_default(),
            client_id: config.client_id.clone().unwrap_or_default(),
            token_file: config.federated_token_file.clone().unwrap_or_default(),
            resource: resource.to_string(),
            cache: Mutex::new(None),
        })
    }

    fn should_refresh_token(cached: Option<&CachedToken>) -> bool {
        match cached {
            Some(token) if token.expires_at.is_some() => {
                token.is_stale(Utc::now(), Duration::seconds(TOKEN_REFRESH_BUFFER_SECS))
            }
            _ => true,
        }
    }

    async fn read_federated_token(&self) -> Result<String, KeyVaultError> {
        tokio::fs::read_to_string(&self.token_file)
            .await
            .map_err(|source| KeyVaultError::FederatedTokenFile {
                path: self.token_file.clone(),
                source,
            })
    }

    async fn authenticate(&self) -> Result<CachedToken, KeyVaultError> {
        let assertion = self.read_federated_token().await?;
        let scope = format!("{}/.default", self.resource);
        let url = format!("{}/{}/oauth2/v2.0/token", self.authority_host, self.tenant_id);

        let request = self.client.post(&url)?.form(&[
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_assertion", assertion.as_str()),
            ("client_assertion_type", CLIENT_ASSERTION_TYPE),
            ("scope", scope.as_str()),
        ]);

        let response = self
            .client
            .send(request)
            .await
            .map_err(|e| KeyVaultError::transport("Failed to get authentication token", e))?;
        let token = parse_token_response(&response.body)?;

        let expires_in = match token.expires_in {
            Some(expires_in) => expires_in,
            None => {
                tracing::debug!(
                    "No expiration time provided in token response, using default of 1 hour"
                );
                DEFAULT_EXPIRES_IN
            }
        };
        let now = Utc::now();
        let expires_at = match Duration::try_seconds(expires_in)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
        {
            Some(expires_at) => expires_at,
            None => {
                tracing::debug!(
                    "Expiration time {} is out of range, using default of 1 hour",
                    expires_in
                );
                now + Duration::seconds(DEFAULT_EXPIRES_IN)
            }
        };
        tracing::debug!(
            "Token will expire at {} (in {} seconds)",
            expires_at.format("%Y-%m-%d %H:%M:%S"),
            expires_in
        );

        tracing::info!("Successfully authenticated using federated token.");
        Ok(CachedToken::expiring(token.access_token, expires_at))
    }
}

#[async_trait]
impl Authenticator for FederatedTokenAuthenticator {
    async fn check_usability(&self) -> Result<(), KeyVaultError> {
        require_variables(&[
            (ENV_AZURE_TENANT_ID, self.tenant_id.as_str()),
            (ENV_AZURE_CLIENT_ID, self.client_id.as_str()),
            (ENV_AZURE_FEDERATED_TOKEN_FILE, self.token_file.as_str()),
        ])?;

        match tokio::fs::try_exists(&self.token_file).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(KeyVaultError::Configuration(format!(
                "Federated token file \"{}\" does not exist.",
                self.token_file
            ))),
            Err(e) => Err(KeyVaultError::Configuration(format!(
                "Federated token file \"{}\" cannot be accessed: {}",
                self.token_file, e
            ))),
        }
    }

    async fn get_authentication_token(&self) -> Result<String, KeyVaultError> {
        let mut cache = self.cache.lock().await;
        match cache.as_ref() {
            Some(cached) if !Self::should_refresh_token(Some(cached)) => {
                return Ok(cached.token.clone());
            }
            _ => {}
        }

        let fresh = self.authenticate().await?;
        let token = fresh.token.clone();
        *cache = Some(fresh);
        Ok(token)
    }

    fn name(&self) -> &'static str {
        "FederatedTokenAuthenticator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn authenticator(vars: &[(&str, &str)]) -> FederatedTokenAuthenticator {
        FederatedTokenAuthenticator::new(
            &HttpClientFactory::new(),
            &EnvConfig::from_vars(vars.iter().copied()),
            "https://vault.azure.net",
        )
        .unwrap()
    }

    #[test]
    fn test_authority_host_trailing_slashes_trimmed() {
        let auth = authenticator(&[("AZURE_AUTHORITY_HOST", "https://login.example.com//")]);
        assert_eq!(auth.authority_host, "https://login.example.com");
    }

    #[test]
    fn test_default_authority_host() {
        let auth = authenticator(&[]);
        assert_eq!(auth.authority_host, DEFAULT_AUTHORITY_HOST);
    }

    #[test]
    fn test_should_refresh_token() {
        assert!(FederatedTokenAuthenticator::should_refresh_token(None));

        let no_expiry = CachedToken::permanent("t".to_string());
        assert!(FederatedTokenAuthenticator::should_refresh_token(Some(&no_expiry)));

        let fresh = CachedToken::expiring("t".to_string(), Utc::now() + Duration::seconds(3600));
        assert!(!FederatedTokenAuthenticator::should_refresh_token(Some(&fresh)));

        let expiring = CachedToken::expiring("t".to_string(), Utc::now() + Duration::seconds(120));
        assert!(FederatedTokenAuthenticator::should_refresh_token(Some(&expiring)));
    }

    #[tokio::test]
    async fn test_unusable_reports_all_missing() {
        let auth = authenticator(&[("AZURE_CLIENT_ID", "client123")]);
        let err = auth.check_usability().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Environment variable \"AZURE_TENANT_ID\" is not set. \
             Environment variable \"AZURE_FEDERATED_TOKEN_FILE\" is not set."
        );
    }

    #[tokio::test]
    async fn test_unusable_without_token_file() {
        let auth = authenticator(&[
            ("AZURE_TENANT_ID", "tenant123"),
            ("AZURE_CLIENT_ID", "client123"),
            ("AZURE_FEDERATED_TOKEN_FILE", "/nonexistent/token"),
        ]);
        let err = auth.check_usability().await.unwrap_err();
        assert!(matches!(err, KeyVaultError::Configuration(_)));
        assert_eq!(
            err.to_string(),
            "Federated token file \"/nonexistent/token\" does not exist."
        );
    }

    #[tokio::test]
    async fn test_usable_with_token_file() {
        let file = NamedTempFile::new().unwrap();
        let token_path = file.path().to_str().unwrap();
        let auth = authenticator(&[
            ("AZURE_TENANT_ID", "tenant123"),
            ("AZURE_CLIENT_ID", "client123"),
            ("AZURE_FEDERATED_TOKEN_FILE", token_path),
        ]);
        assert!(auth.check_usability().await.is_ok());
    }

    #[tokio::test]
    async fn test_unreadable_token_file() {
        let auth = authenticator(&[
            ("AZURE_TENANT_ID", "tenant123"),
            ("AZURE_CLIENT_ID", "client123"),
            ("AZURE_FEDERATED_TOKEN_FILE", "/nonexistent/token"),
        ]);
        let err = auth.get_authentication_token().await.unwrap_err();
        assert!(matches!(err, KeyVaultError::FederatedTokenFile { .. }));
        assert!(err.to_string().contains("/nonexistent/token"));
    }

    fn token_body(access_token: &str, expires_in: &str) -> String {
        format!(
            r#"{{"token_type":"Bearer","expires_in":{},"access_token":"{}"}}"#,
            expires_in, access_token
        )
    }

    async fn federated_authenticator(
        mock_server: &MockServer,
        file: &NamedTempFile,
    ) -> FederatedTokenAuthenticator {
        let authority = format!("{}/", mock_server.uri());
        authenticator(&[
            ("AZURE_TENANT_ID", "tenant123"),
            ("AZURE_CLIENT_ID", "client123"),
            ("AZURE_FEDERATED_TOKEN_FILE", file.path().to_str().unwrap()),
            ("AZURE_AUTHORITY_HOST", authority.as_str()),
        ])
    }

    #[tokio::test]
    async fn test_refreshes_expired_token() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant123/oauth2/v2.0/token"))
            .and(body_string_contains("client_assertion=test-federated-token"))
            .and(body_string_contains("scope=https%3A%2F%2Fvault.azure.net%2F.default"))
            .respond_with(ResponseTemplate::new(200).set_body_string(token_body("token-1", "3600")))
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/tenant123/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(token_body("token-2", "3600")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "test-federated-token").unwrap();
        let auth = federated_authenticator(&mock_server, &file).await;

        assert_eq!(auth.get_authentication_token().await.unwrap(), "token-1");
        assert_eq!(auth.get_authentication_token().await.unwrap(), "token-1");

        auth.cache.lock().await.as_mut().unwrap().expires_at =
            Some(Utc::now() - Duration::seconds(1));
        assert_eq!(auth.get_authentication_token().await.unwrap(), "token-2");
    }

    #[tokio::test]
    async fn test_out_of_range_expiry_uses_default() {
        for expires_in in ["10000000000000", r#""9223372036854775807""#] {
            let mock_server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/tenant123/oauth2/v2.0/token"))
                .respond_with(
                    ResponseTemplate::new(200).set_body_string(token_body("t", expires_in)),
                )
                .expect(1)
                .mount(&mock_server)
                .await;

            let mut file = NamedTempFile::new().unwrap();
            write!(file, "test-federated-token").unwrap();
            let auth = federated_authenticator(&mock_server, &file).await;

            let before = Utc::now();
            assert_eq!(auth.get_authentication_token().await.unwrap(), "t");

            let expires_at = auth.cache.lock().await.as_ref().unwrap().expires_at.unwrap();
            assert!(expires_at >= before + Duration::seconds(DEFAULT_EXPIRES_IN));
            assert!(expires_at <= Utc::now() + Duration::seconds(DEFAULT_EXPIRES_IN));

            // Still fresh, served from the cache
            assert_eq!(auth.get_authentication_token().await.unwrap(), "t");
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_inaccessible_token_file_reports_cause() {
        // A regular file used as a directory fails with ENOTDIR rather than NotFound
        let file = NamedTempFile::new().unwrap();
        let token_path = format!("{}/token", file.path().to_str().unwrap());
        let auth = authenticator(&[
            ("AZURE_TENANT_ID", "tenant123"),
            ("AZURE_CLIENT_ID", "client123"),
            ("AZURE_FEDERATED_TOKEN_FILE", token_path.as_str()),
        ]);
        let err = auth.check_usability().await.unwrap_err();
        assert!(matches!(err, KeyVaultError::Configuration(_)));
        let expected = format!("Federated token file \"{}\" cannot be accessed: ", token_path);
        assert!(err.to_string().starts_with(&expected));
    }
}
