//! HTTP plumbing shared by the authenticators and the vault client.
//!
//! [`HttpClientFactory`] hands out [`HttpClient`]s bound to a base URL. Every
//! client retries transport failures, `5xx` and `429` responses with
//! exponential backoff and turns any other non-success response into an
//! [`HttpError::Status`] carrying the response body.

use crate::KeyVaultError;
use reqwest::{Method, RequestBuilder, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

const DEFAULT_USER_AGENT: &str = concat!("azure-keyvault-client/", env!("CARGO_PKG_VERSION"));
const DEFAULT_MAX_RETRIES: u32 = 10;
const MAX_RETRIES_LIMIT: u32 = 100;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF_EXPONENT: u32 = 6;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("{0}")]
    Request(#[from] reqwest::Error),

    #[error("{message}")]
    Status {
        status: StatusCode,
        body: String,
        message: String,
    },
}

impl HttpError {
    fn from_response(method: &Method, url: &Url, status: StatusCode, body: String) -> Self {
        let kind = if status.is_server_error() { "Server" } else { "Client" };
        let message = format!(
            "{} error: `{} {}` resulted in a `{}` response:\n{}",
            kind, method, url, status, body
        );
        Self::Status {
            status,
            body,
            message,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Request(e) => e.status(),
            Self::Status { status, .. } => Some(*status),
        }
    }

    /// Response body, if the server answered.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Request(_) => None,
            Self::Status { body, .. } => Some(body),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientOptions {
    pub max_retries: u32,
    pub user_agent: String,
    pub timeout: Duration,
    pub initial_backoff: Duration,
}

impl Default for HttpClientOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
        }
    }
}

impl HttpClientOptions {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    fn validate(&self) -> Result<(), KeyVaultError> {
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(KeyVaultError::InvalidArgument(format!(
                "Invalid options when creating client: Value \"{}\" is invalid: \
                 This value should be between 0 and {}.",
                self.max_retries, MAX_RETRIES_LIMIT
            )));
        }
        Ok(())
    }
}

/// Creates HTTP clients sharing one set of default options.
#[derive(Debug, Clone, Default)]
pub struct HttpClientFactory {
    defaults: HttpClientOptions,
}

impl HttpClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(defaults: HttpClientOptions) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &HttpClientOptions {
        &self.defaults
    }

    pub fn client(&self, base_url: &str) -> Result<HttpClient, KeyVaultError> {
        self.client_with(base_url, self.defaults.clone())
    }

    pub fn client_with(
        &self,
        base_url: &str,
        options: HttpClientOptions,
    ) -> Result<HttpClient, KeyVaultError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            KeyVaultError::InvalidArgument(format!(
                "Invalid options when creating client: Value \"{}\" is invalid: {}",
                base_url, e
            ))
        })?;
        options.validate()?;

        let inner = reqwest::Client::builder()
            .user_agent(options.user_agent.as_str())
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(options.timeout)
            .build()
            .map_err(|e| KeyVaultError::transport("Failed to create HTTP client", e.into()))?;

        Ok(HttpClient {
            inner,
            base_url,
            max_retries: options.max_retries,
            initial_backoff: options.initial_backoff,
        })
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

impl HttpResponse {
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    base_url: Url,
    max_retries: u32,
    initial_backoff: Duration,
}

impl HttpClient {
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves `path` against the base URL; absolute URLs replace it.
    pub fn url(&self, path: &str) -> Result<Url, KeyVaultError> {
        self.base_url.join(path).map_err(|e| {
            KeyVaultError::InvalidArgument(format!("Invalid request URL \"{}\": {}", path, e))
        })
    }

    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, KeyVaultError> {
        Ok(self.inner.request(method, self.url(path)?))
    }

    pub fn get(&self, path: &str) -> Result<RequestBuilder, KeyVaultError> {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: &str) -> Result<RequestBuilder, KeyVaultError> {
        self.request(Method::POST, path)
    }

    pub async fn send(&self, request: RequestBuilder) -> Result<HttpResponse, HttpError> {
        let request = request.build()?;
        let mut retries = 0;

        loop {
            let outcome = match request.try_clone() {
                Some(attempt) => self.execute(attempt).await,
                // Streaming bodies cannot be replayed
                None => return self.execute(request).await,
            };

            match outcome {
                Ok(response) => return Ok(response),
                Err(error) if self.should_retry(retries, &error) => {
                    retries += 1;
                    tracing::warn!(
                        "Request failed ({}), retrying ({} of {})",
                        error,
                        retries,
                        self.max_retries
                    );
                    tokio::time::sleep(self.backoff(retries)).await;
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn execute(&self, request: reqwest::Request) -> Result<HttpResponse, HttpError> {
        let method = request.method().clone();
        let url = request.url().clone();

        let response = self.inner.execute(request).await?;
        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(method = %method, url = %url, status = status.as_u16(), "HTTP request");

        if status.is_client_error() || status.is_server_error() {
            return Err(HttpError::from_response(&method, &url, status, body));
        }
        Ok(HttpResponse { status, body })
    }

    fn should_retry(&self, retries: u32, error: &HttpError) -> bool {
        if retries >= self.max_retries {
            return false;
        }
        match error.status() {
            Some(status) => status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error(),
            None => true,
        }
    }

    fn backoff(&self, retries: u32) -> Duration {
        let exponent = retries.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        self.initial_backoff * 2u32.pow(exponent)
    }
}
